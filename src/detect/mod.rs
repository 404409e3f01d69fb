//! Inference engines.
//!
//! - `InferenceEngine`: one loaded model, frame + thresholds in, `DetectionResult` out
//! - `BackendRegistry`: picks an `EngineLoader` for a model reference
//! - `StubBackend`: deterministic engine for `stub://` references
//! - `TractBackend`: ONNX models through tract (feature: backend-tract)
//! - `Annotator`: draws boxes and labels over a frame

mod annotate;
mod backend;
mod backends;
mod nms;
mod registry;
mod result;

pub use annotate::Annotator;
pub use backend::{
    EngineSettings, InferenceEngine, Thresholds, DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE,
    DEFAULT_IOU,
};
pub use backends::{StubBackend, StubLoader};
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, TractLoader};
pub use nms::non_max_suppression;
pub use registry::{BackendRegistry, EngineLoader};
pub use result::{DetectionBox, DetectionResult};
