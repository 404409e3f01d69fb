use std::fmt;

use anyhow::{anyhow, Result};

use crate::detect::Thresholds;
use crate::ingest::CameraLocator;

/// Where one run reads its frames from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Image { path: String },
    Video { path: String },
    Camera { locator: CameraLocator },
}

impl SourceKind {
    pub fn image(path: impl Into<String>) -> Self {
        SourceKind::Image { path: path.into() }
    }

    pub fn video(path: impl Into<String>) -> Self {
        SourceKind::Video { path: path.into() }
    }

    pub fn camera(locator: &str) -> Self {
        SourceKind::Camera {
            locator: CameraLocator::parse(locator),
        }
    }

    /// `image`, `video` or `camera`; stored as the history record kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SourceKind::Image { .. } => "image",
            SourceKind::Video { .. } => "video",
            SourceKind::Camera { .. } => "camera",
        }
    }

    pub fn locator(&self) -> String {
        match self {
            SourceKind::Image { path } | SourceKind::Video { path } => path.clone(),
            SourceKind::Camera { locator } => locator.to_string(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind_name(), self.locator())
    }
}

/// Immutable configuration of one worker run.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRequest {
    model: String,
    source: SourceKind,
    thresholds: Thresholds,
}

impl DetectionRequest {
    pub fn new(model: impl Into<String>, source: SourceKind, thresholds: Thresholds) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(anyhow!("model reference is empty"));
        }
        if source.locator().trim().is_empty() {
            return Err(anyhow!("{} source locator is empty", source.kind_name()));
        }
        // Re-validate: fields of Thresholds are public.
        let thresholds = Thresholds::new(thresholds.confidence, thresholds.iou)?;
        Ok(Self {
            model,
            source,
            thresholds,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// File name of the model reference, used in the history placeholder.
    pub fn model_file_name(&self) -> &str {
        self.model
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.model)
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validates_inputs() {
        let ok = DetectionRequest::new(
            "weights/best.onnx",
            SourceKind::image("a.jpg"),
            Thresholds::default(),
        );
        assert!(ok.is_ok());
        assert!(
            DetectionRequest::new("", SourceKind::image("a.jpg"), Thresholds::default()).is_err()
        );
        assert!(DetectionRequest::new(
            "m.onnx",
            SourceKind::video("  "),
            Thresholds::default()
        )
        .is_err());
        let bad = Thresholds {
            confidence: 1.5,
            iou: 0.5,
        };
        assert!(DetectionRequest::new("m.onnx", SourceKind::image("a.jpg"), bad).is_err());
    }

    #[test]
    fn source_kind_names_and_locators() -> Result<()> {
        let camera = SourceKind::camera("0");
        assert_eq!(camera.kind_name(), "camera");
        assert_eq!(camera.locator(), "0");
        assert_eq!(SourceKind::video("clip.mp4").to_string(), "video clip.mp4");

        let request = DetectionRequest::new(
            "runs/train/weights/best.onnx",
            camera,
            Thresholds::default(),
        )?;
        assert_eq!(request.model_file_name(), "best.onnx");
        Ok(())
    }
}
