//! Frame container shared by sources, engines and the worker.
//!
//! - `Frame`: owned RGB24 pixel buffer plus dimensions and sequence number.
//! - Conversions to and from `image::RgbImage` for decoding, annotation and
//!   writing annotated frames to disk.
//!
//! Pixel rows are tightly packed (`width * 3` bytes per row, no stride).

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded frame in RGB24 layout.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Position of this frame in its source (1-based; images are always 1).
    pub sequence: u64,
}

impl Frame {
    /// Build a frame from packed RGB24 bytes. The length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    pub fn from_rgb_image(image: RgbImage, sequence: u64) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, sequence)
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .context("frame buffer does not match its dimensions")
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Original frame shape as `(height, width)`.
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Write the frame to disk; the format follows the file extension.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        self.to_rgb_image()?
            .save(path)
            .with_context(|| format!("failed to write frame to {}", path.display()))
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
