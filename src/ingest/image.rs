//! Single image source.
//!
//! Decodes one local image into an RGB24 `Frame`. `stub://` locators produce
//! a synthetic image instead of touching the filesystem.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use super::synthetic::SyntheticScene;
use super::STUB_SCHEME;
use crate::frame::Frame;

/// Extensions accepted when scanning a folder for images.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

pub fn load_image(path: &str) -> Result<Frame> {
    if path.starts_with(STUB_SCHEME) {
        return SyntheticScene::from_locator(path).next_frame();
    }
    if path.trim().is_empty() {
        return Err(anyhow!("image path is empty"));
    }
    let decoded = ::image::open(path).with_context(|| format!("failed to open image {}", path))?;
    Frame::from_rgb_image(decoded.into_rgb8(), 1)
}

pub fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read image folder {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if is_image_file(&path) {
            paths.push(path.to_string_lossy().into_owned());
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};

    #[test]
    fn loads_png_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])).save(&path)?;

        let frame = load_image(&path.to_string_lossy())?;
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(&frame.pixels()[..3], &[1, 2, 3]);
        Ok(())
    }

    #[test]
    fn missing_image_is_an_error() {
        assert!(load_image("/nonexistent/sample.png").is_err());
        assert!(load_image("").is_err());
    }

    #[test]
    fn lists_only_image_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::new(2, 2).save(dir.path().join("b.png"))?;
        RgbImage::new(2, 2).save(dir.path().join("a.JPG"))?;
        std::fs::write(dir.path().join("notes.txt"), "x")?;

        let images = list_images(dir.path())?;
        assert_eq!(images.len(), 2);
        assert!(images[0].ends_with("a.JPG"));
        assert!(images[1].ends_with("b.png"));
        Ok(())
    }
}
