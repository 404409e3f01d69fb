use crate::detect::DetectionBox;

/// Boxes kept per frame.
pub const TOP_K: usize = 4;

/// At most `TOP_K` boxes of one frame, sorted by descending confidence.
///
/// Equal confidences keep the order the engine reported them in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankedResultSet {
    boxes: Vec<DetectionBox>,
}

impl RankedResultSet {
    /// Boxes with a non-finite confidence are dropped.
    pub fn from_boxes(mut boxes: Vec<DetectionBox>) -> Self {
        boxes.retain(|b| b.confidence.is_finite());
        // sort_by is stable
        boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        boxes.truncate(TOP_K);
        Self { boxes }
    }

    pub fn boxes(&self) -> &[DetectionBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn into_boxes(self) -> Vec<DetectionBox> {
        self.boxes
    }
}
