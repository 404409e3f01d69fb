use anyhow::Result;

use super::stub_param;
use crate::frame::Frame;

pub(crate) const DEFAULT_WIDTH: u32 = 320;
pub(crate) const DEFAULT_HEIGHT: u32 = 240;

/// Frame generator behind every `stub://` source.
///
/// The scene changes every 25 frames so hashed stub engines see varied
/// content across a clip.
pub(crate) struct SyntheticScene {
    width: u32,
    height: u32,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticScene {
    pub(crate) fn from_locator(locator: &str) -> Self {
        Self {
            width: stub_param(locator, "width").unwrap_or(DEFAULT_WIDTH).max(1),
            height: stub_param(locator, "height").unwrap_or(DEFAULT_HEIGHT).max(1),
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % 25 == 0 {
            self.scene_state = self.scene_state.wrapping_add(37);
        }
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        Frame::new(pixels, self.width, self.height, self.frame_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_scene_honours_requested_size() -> Result<()> {
        let mut scene = SyntheticScene::from_locator("stub://x?width=16&height=8");
        let frame = scene.next_frame()?;
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.sequence, 1);
        Ok(())
    }

    #[test]
    fn synthetic_frames_differ() -> Result<()> {
        let mut scene = SyntheticScene::from_locator("stub://x?width=4&height=4");
        let a = scene.next_frame()?;
        let b = scene.next_frame()?;
        assert_ne!(a.pixels(), b.pixels());
        assert_eq!(scene.frame_count(), 2);
        Ok(())
    }
}
