use thiserror::Error;

use crate::frame::Frame;
use crate::report::{ReportError, ResultTable};

/// Why a run ended early. Carried by `WorkerEvent::RunFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("failed to load model {model}: {reason}")]
    EngineLoad { model: String, reason: String },
    #[error("failed to open {locator}: {reason}")]
    SourceOpen { locator: String, reason: String },
    #[error("failed to read a frame from {locator}: {reason}")]
    FrameRead { locator: String, reason: String },
    #[error("class label '{label}' is not in the configured class map")]
    UnmappedClassLabel { label: String },
    #[error("failed to format detections: {0}")]
    Report(ReportError),
    #[error("inference failed: {reason}")]
    Inference { reason: String },
}

impl From<ReportError> for RunError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::UnmappedClassLabel { label } => RunError::UnmappedClassLabel { label },
            other => RunError::Report(other),
        }
    }
}

/// Events a run pushes to its owner, in emission order.
///
/// For one frame `FrameReady` always precedes `ResultReady`. `RunFinished`
/// and `RunFailed` are terminal: nothing follows them.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Source frame with the ranked boxes drawn over it.
    FrameReady(Frame),
    /// Table of the same frame's ranked boxes.
    ResultReady(ResultTable),
    /// Image runs and video runs that reached the end of the file.
    RunFinished { summary: String },
    RunFailed(RunError),
}

impl WorkerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerEvent::RunFinished { .. } | WorkerEvent::RunFailed(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            WorkerEvent::FrameReady(_) => "frame",
            WorkerEvent::ResultReady(_) => "result",
            WorkerEvent::RunFinished { .. } => "finished",
            WorkerEvent::RunFailed(_) => "failed",
        }
    }
}
