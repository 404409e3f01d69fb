use crate::detect::result::DetectionBox;

/// Greedy non-max suppression.
///
/// Sorts by descending confidence (stable) and drops every box whose IOU with
/// an already kept box exceeds `iou_threshold`.
pub fn non_max_suppression(boxes: &mut Vec<DetectionBox>, iou_threshold: f32) {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..boxes.len() {
        let suppressed = (0..kept).any(|prev| boxes[prev].iou(&boxes[index]) > iou_threshold);
        if !suppressed {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}
