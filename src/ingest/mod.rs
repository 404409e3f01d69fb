//! Frame ingestion sources.
//!
//! Sources a detection run reads from:
//! - Single images (decoded with the `image` crate)
//! - Local video files (feature: ingest-ffmpeg)
//! - Cameras: V4L2 devices (feature: ingest-v4l2) and stream URLs (feature: ingest-ffmpeg)
//! - Synthetic `stub://` sources for every shape (testing and demos)
//!
//! All sources produce packed RGB24 `Frame`s. A source handle is owned by
//! exactly one worker run and must be released before the run reports
//! termination, so a following run can reopen the same device.

pub mod camera;
#[cfg(feature = "ingest-ffmpeg")]
pub(crate) mod ffmpeg;
pub mod file;
pub mod image;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;
use std::fmt;

use crate::frame::Frame;

pub use camera::{CameraSettings, CameraSource};
pub use file::VideoFileSource;
pub use image::load_image;

pub(crate) const STUB_SCHEME: &str = "stub://";

/// A sequence of frames owned by one run.
pub trait FrameSource: Send {
    /// Read the next frame. `Ok(None)` means a finite source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying file or device. Idempotent.
    fn release(&mut self);

    /// Frames read so far.
    fn frames_read(&self) -> u64;
}

/// Opens sources for each source kind.
///
/// The worker only talks to this trait; tests substitute scripted sources.
pub trait SourceProvider: Send + Sync {
    fn open_image(&self, path: &str) -> Result<Frame>;

    fn open_video(&self, path: &str) -> Result<Box<dyn FrameSource>>;

    fn open_camera(&self, locator: &CameraLocator) -> Result<Box<dyn FrameSource>>;
}

/// Camera locator: a numeric device index or a string identifier
/// (device path, stream URL, `stub://` feed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraLocator {
    Index(u32),
    Named(String),
}

impl CameraLocator {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<u32>() {
            Ok(index) => CameraLocator::Index(index),
            Err(_) => CameraLocator::Named(value.to_string()),
        }
    }
}

impl fmt::Display for CameraLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraLocator::Index(index) => write!(f, "{}", index),
            CameraLocator::Named(name) => f.write_str(name),
        }
    }
}

/// Sources backed by local files and devices.
#[derive(Clone, Debug, Default)]
pub struct LocalSources {
    pub camera: CameraSettings,
}

impl LocalSources {
    pub fn new(camera: CameraSettings) -> Self {
        Self { camera }
    }
}

impl SourceProvider for LocalSources {
    fn open_image(&self, path: &str) -> Result<Frame> {
        load_image(path)
    }

    fn open_video(&self, path: &str) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(VideoFileSource::open(path)?))
    }

    fn open_camera(&self, locator: &CameraLocator) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(CameraSource::open(locator, &self.camera)?))
    }
}

/// Parse `key=value` pairs from the query part of a `stub://name?k=v&...` locator.
pub(crate) fn stub_params(locator: &str) -> Vec<(String, String)> {
    let Some((_, query)) = locator.split_once('?') else {
        return Vec::new();
    };
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub(crate) fn stub_param<T: std::str::FromStr>(locator: &str, key: &str) -> Option<T> {
    stub_params(locator)
        .into_iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_locator_accepts_index_or_identifier() {
        assert_eq!(CameraLocator::parse("0"), CameraLocator::Index(0));
        assert_eq!(CameraLocator::parse(" 2 "), CameraLocator::Index(2));
        assert_eq!(
            CameraLocator::parse("rtsp://cam/stream"),
            CameraLocator::Named("rtsp://cam/stream".to_string())
        );
        assert_eq!(CameraLocator::parse("-1").to_string(), "-1");
    }

    #[test]
    fn stub_params_parse_query() {
        let locator = "stub://clip?frames=5&width=32";
        assert_eq!(stub_param::<u64>(locator, "frames"), Some(5));
        assert_eq!(stub_param::<u32>(locator, "width"), Some(32));
        assert_eq!(stub_param::<u32>(locator, "height"), None);
        assert!(stub_params("stub://clip").is_empty());
    }
}
