//! Container damage inspection
//!
//! Runs an object-detection model over single images, video files and live
//! cameras, reports the top detections of every frame as a normalized table,
//! and keeps a local history of runs plus user feedback.
//!
//! # Architecture
//!
//! A run is driven by a dedicated worker thread that:
//!
//! 1. Loads an inference engine for the requested model reference.
//! 2. Reads frames from one source kind (image, video, camera).
//! 3. Keeps the four most confident boxes of each frame.
//! 4. Emits the annotated frame, then the result table, on a bounded queue.
//! 5. Observes a cancel token at every loop head and releases its source
//!    before it exits.
//!
//! The caller (`DetectionSession`) owns at most one run at a time and
//! records each run in the history store.
//!
//! # Module Structure
//!
//! - `frame`: RGB24 frame container
//! - `ingest`: image, video file and camera sources
//! - `detect`: engines, loader registry, annotation
//! - `report`: ranking, class map, result table
//! - `worker`: the detection worker and its events
//! - `session`: single-active-run owner with history bookkeeping
//! - `storage`: SQLite and in-memory history / feedback stores
//! - `config`: file + environment configuration

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod report;
pub mod session;
pub mod storage;
pub mod ui;
pub mod worker;

pub use config::InspectConfig;
pub use detect::{
    BackendRegistry, DetectionBox, DetectionResult, EngineLoader, EngineSettings,
    InferenceEngine, Thresholds,
};
pub use frame::Frame;
pub use ingest::{CameraLocator, FrameSource, LocalSources, SourceProvider};
pub use report::{ClassMap, ImageId, RankedResultSet, ResultTable, NO_DETECTIONS_MESSAGE};
pub use session::DetectionSession;
pub use storage::{
    FeedbackEntry, FeedbackKind, FeedbackStore, HistoryRecord, HistoryStore, InMemoryStore,
    RecordId, SqliteStore,
};
pub use worker::{
    CancelToken, DetectionRequest, DetectionWorker, RunError, SourceKind, WorkerEvent,
    WorkerHandle, WorkerSettings,
};

/// URI of a fresh, private in-memory SQLite database.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:container_inspect_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

/// Worker wired to the local sources and the engines compiled into this build.
pub fn local_worker(cfg: &InspectConfig) -> Result<DetectionWorker> {
    let registry = BackendRegistry::with_defaults(cfg.engine_settings()?);
    Ok(DetectionWorker::new(
        std::sync::Arc::new(registry),
        std::sync::Arc::new(cfg.local_sources()),
        std::sync::Arc::new(cfg.classes.clone()),
        cfg.worker.clone(),
    ))
}
