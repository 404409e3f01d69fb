use std::sync::Arc;

use anyhow::Result;

use crate::detect::annotate::Annotator;
use crate::frame::Frame;

/// One candidate detection in pixel space of its source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionBox {
    pub confidence: f32,
    pub class_index: usize,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl DetectionBox {
    /// `(x1, y1, x2, y2)` corners.
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.x_center - half_w,
            self.y_center - half_h,
            self.x_center + half_w,
            self.y_center + half_h,
        )
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &DetectionBox) -> f32 {
        let (ax1, ay1, ax2, ay2) = self.corners();
        let (bx1, by1, bx2, by2) = other.corners();
        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let intersection = inter_w * inter_h;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Output of one inference call.
///
/// Holds the source frame so the result can render its own overlay.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub boxes: Vec<DetectionBox>,
    frame: Frame,
    names: Arc<[String]>,
    annotator: Arc<Annotator>,
}

impl DetectionResult {
    pub fn new(
        frame: Frame,
        boxes: Vec<DetectionBox>,
        names: Arc<[String]>,
        annotator: Arc<Annotator>,
    ) -> Self {
        Self {
            boxes,
            frame,
            names,
            annotator,
        }
    }

    /// Original frame shape as `(height, width)`.
    pub fn orig_shape(&self) -> (u32, u32) {
        self.frame.shape()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.names.get(class_index).map(String::as_str)
    }

    /// Replace the box set, e.g. with a ranked subset, before annotating.
    pub fn replace_boxes(&mut self, boxes: Vec<DetectionBox>) {
        self.boxes = boxes;
    }

    /// Copy of the source frame with the current boxes drawn over it.
    pub fn annotate(&self) -> Result<Frame> {
        self.annotator.draw(&self.frame, &self.boxes, &self.names)
    }
}
