//! inspect_history - list recorded detection runs

use anyhow::Result;
use clap::Parser;

use container_inspect::{HistoryStore, InspectConfig, SqliteStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the history database (defaults to the configured one).
    #[arg(long, env = "INSPECT_DB_PATH")]
    db_path: Option<String>,
    /// Emit JSON instead of a table.
    #[arg(long)]
    json: bool,
    /// Show at most this many records.
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let db_path = match args.db_path {
        Some(path) => path,
        None => InspectConfig::load()?.db_path,
    };
    let store = SqliteStore::open(&db_path)?;
    let mut records = store.list_records()?;
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no detection runs recorded in {}", db_path);
        return Ok(());
    }
    for record in records {
        println!(
            "#{} [{}] {} {}",
            record.id, record.detected_at, record.detection_type, record.source
        );
        for line in record.summary.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}
