use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::detect::annotate::Annotator;
use crate::detect::result::DetectionResult;
use crate::frame::Frame;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.45;
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Confidence and overlap thresholds passed to every inference call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub confidence: f32,
    pub iou: f32,
}

impl Thresholds {
    pub fn new(confidence: f32, iou: f32) -> Result<Self> {
        for (name, value) in [("confidence", confidence), ("iou", iou)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(anyhow!(
                    "{} threshold must be within 0.0..=1.0 (got {})",
                    name,
                    value
                ));
            }
        }
        Ok(Self { confidence, iou })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
        }
    }
}

/// Settings shared by every engine a registry loads.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Model class labels, indexed by the class index the model reports.
    pub class_names: Arc<[String]>,
    /// Square model input edge in pixels.
    pub input_size: u32,
    pub annotator: Arc<Annotator>,
}

impl EngineSettings {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            class_names: class_names.into(),
            input_size: DEFAULT_INPUT_SIZE,
            annotator: Arc::new(Annotator::default()),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = Arc::new(annotator);
        self
    }
}

/// Inference engine trait.
///
/// An engine owns its model exclusively; one worker run holds one engine.
/// Implementations take ownership of the frame so the returned
/// `DetectionResult` can annotate it later.
pub trait InferenceEngine: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class index to label table of the loaded model.
    fn class_names(&self) -> &[String];

    /// Run detection on a frame.
    ///
    /// Boxes are reported in pixel space of `frame`, already filtered by
    /// `thresholds.confidence` and suppressed by `thresholds.iou`.
    fn infer(&mut self, frame: Frame, thresholds: Thresholds) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
