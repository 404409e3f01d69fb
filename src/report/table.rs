use std::fmt;
use std::path::Path;

use thiserror::Error;

use super::labels::ClassMap;
use crate::detect::{DetectionBox, DetectionResult};

/// The one sentinel shown when no box survives filtering.
pub const NO_DETECTIONS_MESSAGE: &str = "No target detected in the current frame.";

const HEADER: &str = "| image_id | class_id | x_center | y_center | width | height |";
const DIVIDER: &str = "|----------|----------|----------|----------|-------|--------|";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("detected class label '{label}' is missing from the class map")]
    UnmappedClassLabel { label: String },
    #[error("class index {index} has no label in the model's class table")]
    UnknownClassIndex { index: usize },
    #[error("frame has zero size ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// First column of every row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageId {
    /// Base file name of a single image, without extension.
    Named(String),
    VideoFrame,
    CameraFrame,
}

impl ImageId {
    /// Both `/` and `\` count as directory separators.
    pub fn from_image_path(path: &str) -> Self {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let stem = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| path.to_string());
        ImageId::Named(stem)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageId::Named(name) => f.write_str(name),
            ImageId::VideoFrame => f.write_str("video_frame"),
            ImageId::CameraFrame => f.write_str("camera_frame"),
        }
    }
}

/// One table row; coordinates are normalized to the frame size.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    pub image_id: String,
    pub class_id: String,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "| {} | {} | {:.4} | {:.4} | {:.4} | {:.4} |",
            self.image_id, self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Rendered result of one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultTable {
    NoDetections,
    Rows(Vec<ResultRow>),
}

impl ResultTable {
    pub fn rows(&self) -> &[ResultRow] {
        match self {
            ResultTable::NoDetections => &[],
            ResultTable::Rows(rows) => rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResultTable::NoDetections)
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultTable::NoDetections => f.write_str(NO_DETECTIONS_MESSAGE),
            ResultTable::Rows(rows) => {
                write!(f, "{}\n{}", HEADER, DIVIDER)?;
                for row in rows {
                    write!(f, "\n{}", row)?;
                }
                Ok(())
            }
        }
    }
}

/// Format the (already ranked) boxes of an inference result.
pub fn format_result(
    image_id: &ImageId,
    result: &DetectionResult,
    classes: &ClassMap,
) -> Result<ResultTable, ReportError> {
    format_boxes(
        image_id,
        &result.boxes,
        result.names(),
        result.orig_shape(),
        classes,
    )
}

/// Format boxes measured in a frame of `shape = (height, width)`.
///
/// Any box whose label cannot be mapped fails the whole table.
pub fn format_boxes(
    image_id: &ImageId,
    boxes: &[DetectionBox],
    names: &[String],
    shape: (u32, u32),
    classes: &ClassMap,
) -> Result<ResultTable, ReportError> {
    if boxes.is_empty() {
        return Ok(ResultTable::NoDetections);
    }
    let (height, width) = shape;
    if width == 0 || height == 0 {
        return Err(ReportError::EmptyFrame { width, height });
    }
    let (w, h) = (width as f32, height as f32);
    let image_id = image_id.to_string();

    let rows = boxes
        .iter()
        .map(|bbox| {
            let label = names
                .get(bbox.class_index)
                .ok_or(ReportError::UnknownClassIndex {
                    index: bbox.class_index,
                })?;
            let class_id =
                classes
                    .class_id(label)
                    .ok_or_else(|| ReportError::UnmappedClassLabel {
                        label: label.clone(),
                    })?;
            Ok(ResultRow {
                image_id: image_id.clone(),
                class_id,
                x_center: bbox.x_center / w,
                y_center: bbox.y_center / h,
                width: bbox.width / w,
                height: bbox.height / h,
            })
        })
        .collect::<Result<Vec<_>, ReportError>>()?;
    Ok(ResultTable::Rows(rows))
}
