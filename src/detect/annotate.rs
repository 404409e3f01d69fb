use std::fmt;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::DetectionBox;
use crate::frame::Frame;

pub const DEFAULT_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 18.0;

const PALETTE: [[u8; 3]; 8] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
];

/// Draws detection boxes over a frame.
///
/// Labels are only rendered when a font has been loaded; without one the
/// overlay is boxes coloured per class.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    thickness: u32,
}

impl Annotator {
    pub fn new(thickness: u32) -> Self {
        Self {
            font: None,
            thickness: thickness.max(1),
        }
    }

    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("invalid font file {}", path.display()))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn draw(&self, frame: &Frame, boxes: &[DetectionBox], names: &[String]) -> Result<Frame> {
        let mut canvas = frame.to_rgb_image()?;
        for bbox in boxes {
            let color = Rgb(PALETTE[bbox.class_index % PALETTE.len()]);
            let Some(rect) = clamp_rect(bbox, canvas.width(), canvas.height()) else {
                continue;
            };
            for inset in 0..self.thickness {
                let Some(inner) = shrink(rect, inset) else {
                    break;
                };
                draw_hollow_rect_mut(&mut canvas, inner, color);
            }
            if let Some(font) = &self.font {
                let label = match names.get(bbox.class_index) {
                    Some(name) => format!("{} {:.2}", name, bbox.confidence),
                    None => format!("{} {:.2}", bbox.class_index, bbox.confidence),
                };
                draw_label(&mut canvas, font, rect, color, &label);
            }
        }
        Frame::from_rgb_image(canvas, frame.sequence)
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(DEFAULT_THICKNESS)
    }
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("font", &self.font.is_some())
            .field("thickness", &self.thickness)
            .finish()
    }
}

fn clamp_rect(bbox: &DetectionBox, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let (x1, y1, x2, y2) = bbox.corners();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x1 = x1.clamp(0.0, max_x) as i32;
    let y1 = y1.clamp(0.0, max_y) as i32;
    let x2 = x2.clamp(0.0, max_x) as i32;
    let y2 = y2.clamp(0.0, max_y) as i32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

fn shrink(rect: Rect, inset: u32) -> Option<Rect> {
    let w = rect.width().checked_sub(inset * 2)?;
    let h = rect.height().checked_sub(inset * 2)?;
    if w == 0 || h == 0 {
        return None;
    }
    Some(Rect::at(rect.left() + inset as i32, rect.top() + inset as i32).of_size(w, h))
}

fn draw_label(canvas: &mut RgbImage, font: &FontArc, rect: Rect, color: Rgb<u8>, label: &str) {
    let scale = PxScale::from(LABEL_SCALE);
    let (text_w, text_h) = text_size(scale, font, label);
    let tab_h = text_h + 4;
    let top = if rect.top() >= tab_h as i32 {
        rect.top() - tab_h as i32
    } else {
        rect.bottom()
    };
    let tab = Rect::at(rect.left(), top).of_size(text_w.max(1) + 4, tab_h.max(1));
    draw_filled_rect_mut(canvas, tab, color);
    draw_text_mut(
        canvas,
        Rgb([255, 255, 255]),
        rect.left() + 2,
        top + 2,
        scale,
        font,
        label,
    );
}
