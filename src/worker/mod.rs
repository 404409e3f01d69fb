//! Detection worker.
//!
//! One run = one thread driving an inference engine over an image, a video
//! file or a camera, pushing typed events onto a bounded queue:
//! - `request`: what to run (`DetectionRequest`, `SourceKind`)
//! - `run`: the per-kind loops (`DetectionWorker::spawn`)
//! - `event`: `WorkerEvent` and the `RunError` taxonomy
//! - `cancel` / `handle`: cooperative stop plus the mandatory join
//!
//! The worker does not enforce a single active run; `DetectionSession` does.

pub mod cancel;
pub mod event;
pub mod handle;
pub mod request;
pub mod run;

pub use cancel::CancelToken;
pub use event::{RunError, WorkerEvent};
pub use handle::WorkerHandle;
pub use request::{DetectionRequest, SourceKind};
pub use run::{DetectionWorker, WorkerSettings, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_DELAY};
