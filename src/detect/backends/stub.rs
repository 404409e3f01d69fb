use std::sync::Arc;

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::detect::annotate::Annotator;
use crate::detect::backend::{EngineSettings, InferenceEngine, Thresholds};
use crate::detect::nms::non_max_suppression;
use crate::detect::registry::EngineLoader;
use crate::detect::result::{DetectionBox, DetectionResult};
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";
const MAX_STUB_BOXES: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StubProfile {
    /// Boxes derived from a hash of the frame pixels.
    Hashed,
    /// Never detects anything.
    Empty,
}

/// Stub backend for demos and tests.
///
/// Deterministic per frame content: the same pixels always produce the same
/// candidate boxes, which are then filtered by the request thresholds.
pub struct StubBackend {
    names: Arc<[String]>,
    annotator: Arc<Annotator>,
    profile: StubProfile,
}

impl StubBackend {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            names: settings.class_names.clone(),
            annotator: settings.annotator.clone(),
            profile: StubProfile::Hashed,
        }
    }

    pub fn empty(settings: &EngineSettings) -> Self {
        Self {
            profile: StubProfile::Empty,
            ..Self::new(settings)
        }
    }

    fn candidates(&self, frame: &Frame) -> Vec<DetectionBox> {
        if self.profile == StubProfile::Empty || self.names.is_empty() {
            return Vec::new();
        }
        let scores: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let layout: [u8; 32] = Sha256::digest(scores).into();

        let width = frame.width as f32;
        let height = frame.height as f32;
        let count = (scores[0] % MAX_STUB_BOXES) as usize;

        (0..count)
            .map(|i| {
                let s = &scores[1 + i * 4..5 + i * 4];
                let l = &layout[i * 4..i * 4 + 4];
                let box_w = width * (0.05 + unit(s[2]) * 0.3);
                let box_h = height * (0.05 + unit(s[3]) * 0.3);
                DetectionBox {
                    confidence: 0.05 + unit(s[0]) * 0.9,
                    class_index: s[1] as usize % self.names.len(),
                    x_center: box_w / 2.0 + unit(l[0]) * (width - box_w),
                    y_center: box_h / 2.0 + unit(l[1]) * (height - box_h),
                    width: box_w,
                    height: box_h,
                }
            })
            .collect()
    }
}

fn unit(byte: u8) -> f32 {
    byte as f32 / 255.0
}

impl InferenceEngine for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &[String] {
        &self.names
    }

    fn infer(&mut self, frame: Frame, thresholds: Thresholds) -> Result<DetectionResult> {
        let mut boxes: Vec<DetectionBox> = self
            .candidates(&frame)
            .into_iter()
            .filter(|b| b.confidence >= thresholds.confidence)
            .collect();
        non_max_suppression(&mut boxes, thresholds.iou);

        Ok(DetectionResult::new(
            frame,
            boxes,
            self.names.clone(),
            self.annotator.clone(),
        ))
    }
}

/// Loads `stub://<profile>` references. `stub://empty` never detects.
pub struct StubLoader {
    settings: EngineSettings,
}

impl StubLoader {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineLoader for StubLoader {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn accepts(&self, model_ref: &str) -> bool {
        model_ref.starts_with(STUB_SCHEME)
    }

    fn load(&self, model_ref: &str) -> Result<Box<dyn InferenceEngine>> {
        if self.settings.class_names.is_empty() {
            return Err(anyhow!("stub engine requires at least one class name"));
        }
        let variant = model_ref
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("not a stub model reference: {}", model_ref))?;
        let engine = match variant {
            "empty" => StubBackend::empty(&self.settings),
            _ => StubBackend::new(&self.settings),
        };
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EngineSettings {
        EngineSettings::new(
            ["hole", "broken", "rusty", "scratch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn frame(seed: u8) -> Frame {
        let pixels = (0..64 * 48 * 3)
            .map(|i| (i as u32 % 251) as u8 ^ seed)
            .collect();
        Frame::new(pixels, 64, 48, 1).unwrap()
    }

    #[test]
    fn loader_rejects_references_outside_its_scheme() {
        let loader = StubLoader::new(settings());
        assert!(loader.load("x").is_err());
        assert!(loader.load("weights/best.onnx").is_err());
        assert!(loader.load("stub://empty").is_ok());
    }

    #[test]
    fn stub_backend_is_deterministic_per_frame() -> Result<()> {
        let mut backend = StubBackend::new(&settings());
        let loose = Thresholds::new(0.0, 1.0)?;

        let a = backend.infer(frame(3), loose)?;
        let b = backend.infer(frame(3), loose)?;
        assert_eq!(a.boxes, b.boxes);
        assert_eq!(a.orig_shape(), (48, 64));
        Ok(())
    }

    #[test]
    fn stub_backend_honours_confidence_threshold() -> Result<()> {
        let mut backend = StubBackend::new(&settings());
        for seed in 0..16u8 {
            let strict = backend.infer(frame(seed), Thresholds::new(0.6, 1.0)?)?;
            assert!(strict.boxes.iter().all(|b| b.confidence >= 0.6));

            let none = backend.infer(frame(seed), Thresholds::new(1.0, 1.0)?)?;
            assert!(none.boxes.is_empty());
        }
        Ok(())
    }

    #[test]
    fn stub_boxes_stay_inside_the_frame() -> Result<()> {
        let mut backend = StubBackend::new(&settings());
        for seed in 0..16u8 {
            let result = backend.infer(frame(seed), Thresholds::new(0.0, 1.0)?)?;
            for b in &result.boxes {
                let (x1, y1, x2, y2) = b.corners();
                assert!(x1 >= -1e-3 && y1 >= -1e-3);
                assert!(x2 <= 64.0 + 1e-3 && y2 <= 48.0 + 1e-3);
                assert!(b.class_index < 4);
            }
        }
        Ok(())
    }

    #[test]
    fn empty_profile_never_detects() -> Result<()> {
        let loader = StubLoader::new(settings());
        let mut engine = loader.load("stub://empty")?;
        let result = engine.infer(frame(1), Thresholds::new(0.0, 1.0)?)?;
        assert!(result.boxes.is_empty());
        Ok(())
    }
}
