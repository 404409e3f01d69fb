//! inspect - run container damage detection from the command line
//!
//! Runs one detection over an image, a video file or a camera (or a batch
//! of images from a folder), prints the result table of every frame and
//! records each run in the history database. Ctrl-C stops the active run
//! and waits for it to release its source.

use anyhow::{anyhow, Result};
use clap::{ArgGroup, Parser};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use container_inspect::ingest::image::list_images;
use container_inspect::ui::{Ui, UiMode};
use container_inspect::{
    local_worker, DetectionRequest, DetectionSession, Frame, InspectConfig, SourceKind,
    SqliteStore, Thresholds, WorkerEvent,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["image", "video", "camera", "folder"])
))]
struct Args {
    /// Single image to inspect.
    #[arg(long, value_name = "PATH")]
    image: Option<String>,
    /// Local video file to inspect frame by frame.
    #[arg(long, value_name = "PATH")]
    video: Option<String>,
    /// Camera index (0, 1, ...), device path or stream URL.
    #[arg(long, value_name = "ID")]
    camera: Option<String>,
    /// Inspect every image in a directory, one run per image.
    #[arg(long, value_name = "DIR")]
    folder: Option<PathBuf>,
    /// Model reference (overrides config).
    #[arg(long, env = "INSPECT_MODEL")]
    model: Option<String>,
    /// Confidence threshold (overrides config).
    #[arg(long)]
    confidence: Option<f32>,
    /// IOU threshold (overrides config).
    #[arg(long)]
    iou: Option<f32>,
    /// Write the latest annotated frame here (a directory for --folder).
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(Some(&args.ui)), std::io::stderr().is_terminal());

    let mut cfg = InspectConfig::load()?;
    if let Some(model) = &args.model {
        cfg.model = model.clone();
    }
    let thresholds = Thresholds::new(
        args.confidence.unwrap_or(cfg.thresholds.confidence),
        args.iou.unwrap_or(cfg.thresholds.iou),
    )?;

    let mut session = {
        let _stage = ui.stage("Open history database");
        let store = SqliteStore::open(&cfg.db_path)?;
        DetectionSession::new(local_worker(&cfg)?, store)
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    let sources = match (&args.image, &args.video, &args.camera, &args.folder) {
        (Some(path), _, _, _) => vec![SourceKind::image(path.as_str())],
        (_, Some(path), _, _) => vec![SourceKind::video(path.as_str())],
        (_, _, Some(camera), _) => vec![SourceKind::camera(camera)],
        (_, _, _, Some(dir)) => {
            let images = list_images(dir)?;
            if images.is_empty() {
                return Err(anyhow!("no images found in {}", dir.display()));
            }
            images.into_iter().map(SourceKind::image).collect()
        }
        _ => return Err(anyhow!("one of --image, --video, --camera, --folder is required")),
    };
    let batch = args.folder.is_some();
    if let (true, Some(dir)) = (batch, &args.out) {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow!("failed to create output directory {}: {}", dir.display(), e))?;
    }

    let mut failures = 0usize;
    for source in sources {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let out = output_path(args.out.as_deref(), &source, batch);
        let request = DetectionRequest::new(cfg.model.clone(), source, thresholds)?;
        if !run_one(&mut session, request, &ui, &interrupted, out.as_deref())? {
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} detection run(s) failed", failures));
    }
    Ok(())
}

/// Drive one run to its end. Returns false when the run failed.
fn run_one(
    session: &mut DetectionSession<SqliteStore>,
    request: DetectionRequest,
    ui: &Ui,
    interrupted: &AtomicBool,
    out: Option<&Path>,
) -> Result<bool> {
    let label = request.source().to_string();
    let is_image = matches!(request.source(), SourceKind::Image { .. });
    let record_id = session.start(request)?;
    log::info!("history record {} created for {}", record_id, label);

    let mut counter = ui.frame_counter(&label);
    let mut latest: Option<Frame> = None;
    let mut outcome = "stopped";
    let mut succeeded = true;

    while session.is_running() {
        if interrupted.load(Ordering::SeqCst) {
            session.stop()?;
            outcome = "interrupted";
            break;
        }
        let Some(event) = session.next_event(POLL_INTERVAL)? else {
            continue;
        };
        match event {
            WorkerEvent::FrameReady(frame) => latest = Some(frame),
            WorkerEvent::ResultReady(table) => {
                counter.tick(table.rows().len());
                println!("{}\n", table);
            }
            WorkerEvent::RunFinished { summary } => {
                // Image summaries repeat the table already printed.
                if !is_image {
                    println!("{}", summary);
                }
                outcome = "completed";
            }
            WorkerEvent::RunFailed(err) => {
                eprintln!("error: {}", err);
                outcome = "failed";
                succeeded = false;
            }
        }
    }
    counter.finish(outcome);

    if let (Some(path), Some(frame)) = (out, latest) {
        frame.save(path)?;
        log::info!("annotated frame written to {}", path.display());
    }
    Ok(succeeded)
}

fn output_path(out: Option<&Path>, source: &SourceKind, batch: bool) -> Option<PathBuf> {
    let out = out?;
    if !batch {
        return Some(out.to_path_buf());
    }
    let name = Path::new(&source.locator())
        .file_name()
        .map(|name| name.to_os_string())?;
    Some(out.join(name))
}
