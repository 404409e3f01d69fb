#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::annotate::Annotator;
use crate::detect::backend::{EngineSettings, InferenceEngine, Thresholds};
use crate::detect::nms::non_max_suppression;
use crate::detect::registry::EngineLoader;
use crate::detect::result::{DetectionBox, DetectionResult};
use crate::frame::Frame;

const LETTERBOX_FILL: u8 = 114;
const BOX_FIELDS: usize = 4;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single output shaped `[1, 4 + classes, anchors]` holding
/// `cx, cy, w, h` in model input pixels followed by per-class scores.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    names: Arc<[String]>,
    annotator: Arc<Annotator>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: &EngineSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size: settings.input_size,
            names: settings.class_names.clone(),
            annotator: settings.annotator.clone(),
        })
    }

    /// Letterbox the frame into the model input and return the scale ratio.
    fn build_input(&self, frame: &Frame) -> Result<(Tensor, f32)> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("frame has zero size"));
        }
        let size = self.input_size;
        let ratio = (size as f32 / frame.width as f32).min(size as f32 / frame.height as f32);
        let new_w = ((frame.width as f32 * ratio).round() as u32).clamp(1, size);
        let new_h = ((frame.height as f32 * ratio).round() as u32).clamp(1, size);

        let source = frame.to_rgb_image()?;
        let resized = imageops::resize(&source, new_w, new_h, imageops::FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
        imageops::overlay(&mut canvas, &resized, 0, 0);

        let size = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
        });
        Ok((input.into_tensor(), ratio))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        ratio: f32,
        frame: &Frame,
        thresholds: Thresholds,
    ) -> Result<Vec<DetectionBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [batch, fields, anchors]")?;

        let (_, fields, anchors) = preds.dim();
        if fields <= BOX_FIELDS {
            return Err(anyhow!("model output has no class scores ({} fields)", fields));
        }
        let classes = fields - BOX_FIELDS;
        if classes != self.names.len() {
            log::warn!(
                "model reports {} classes but {} class names are configured",
                classes,
                self.names.len()
            );
        }

        let max_x = frame.width as f32;
        let max_y = frame.height as f32;
        let mut boxes = Vec::new();
        for anchor in 0..anchors {
            let (class_index, confidence) = (0..classes)
                .map(|c| (c, preds[[0, BOX_FIELDS + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });
            if !confidence.is_finite() || confidence < thresholds.confidence {
                continue;
            }

            let cx = preds[[0, 0, anchor]] / ratio;
            let cy = preds[[0, 1, anchor]] / ratio;
            let w = preds[[0, 2, anchor]] / ratio;
            let h = preds[[0, 3, anchor]] / ratio;
            let x1 = (cx - w / 2.0).clamp(0.0, max_x);
            let y1 = (cy - h / 2.0).clamp(0.0, max_y);
            let x2 = (cx + w / 2.0).clamp(0.0, max_x);
            let y2 = (cy + h / 2.0).clamp(0.0, max_y);

            boxes.push(DetectionBox {
                confidence,
                class_index,
                x_center: (x1 + x2) / 2.0,
                y_center: (y1 + y2) / 2.0,
                width: x2 - x1,
                height: y2 - y1,
            });
        }

        non_max_suppression(&mut boxes, thresholds.iou);
        Ok(boxes)
    }
}

impl InferenceEngine for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &[String] {
        &self.names
    }

    fn infer(&mut self, frame: Frame, thresholds: Thresholds) -> Result<DetectionResult> {
        let (input, ratio) = self.build_input(&frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let boxes = self.decode(outputs, ratio, &frame, thresholds)?;

        Ok(DetectionResult::new(
            frame,
            boxes,
            self.names.clone(),
            self.annotator.clone(),
        ))
    }
}

/// Loads `*.onnx` model files from local disk.
pub struct TractLoader {
    settings: EngineSettings,
}

impl TractLoader {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineLoader for TractLoader {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn accepts(&self, model_ref: &str) -> bool {
        Path::new(model_ref)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
    }

    fn load(&self, model_ref: &str) -> Result<Box<dyn InferenceEngine>> {
        Ok(Box::new(TractBackend::new(model_ref, &self.settings)?))
    }
}
