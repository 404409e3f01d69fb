//! inspect_feedback - submit or list user feedback

use anyhow::Result;
use clap::{Parser, Subcommand};

use container_inspect::{FeedbackKind, FeedbackStore, InspectConfig, SqliteStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the database (defaults to the configured one).
    #[arg(long, env = "INSPECT_DB_PATH")]
    db_path: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a feedback entry.
    Submit {
        /// bug | feature | interface | other
        #[arg(long, default_value = "other")]
        kind: FeedbackKind,
        /// Optional e-mail or phone number.
        #[arg(long)]
        contact: Option<String>,
        /// Feedback text.
        content: String,
    },
    /// List feedback entries, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let db_path = match args.db_path {
        Some(path) => path,
        None => InspectConfig::load()?.db_path,
    };
    let mut store = SqliteStore::open(&db_path)?;

    match args.command {
        Command::Submit {
            kind,
            contact,
            content,
        } => {
            let id = store.add_feedback(kind, &content, contact.as_deref())?;
            log::info!("feedback {} stored in {}", id, db_path);
            println!("Thank you for your feedback! (#{})", id);
        }
        Command::List { json } => {
            let entries = store.list_feedback()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    let contact = entry.contact.as_deref().unwrap_or("-");
                    println!(
                        "#{} [{}] {} ({})\n    {}",
                        entry.id, entry.submitted_at, entry.kind, contact, entry.content
                    );
                }
            }
        }
    }
    Ok(())
}
