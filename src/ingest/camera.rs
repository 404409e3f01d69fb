//! Live camera source.
//!
//! `CameraSource` opens an effectively infinite frame sequence from:
//! - a numeric device index (`0` maps to `/dev/video0`, feature: ingest-v4l2)
//! - a device path such as `/dev/video2` (feature: ingest-v4l2)
//! - a stream URL such as `rtsp://...` (feature: ingest-ffmpeg)
//! - `stub://name` synthetic feeds; `?fail_after=N` makes read N+1 fail
//!
//! A failed read is reported as an error; the caller decides whether that
//! ends the run.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-ffmpeg")]
use super::ffmpeg::FfmpegSource;
use super::synthetic::SyntheticScene;
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::V4l2Camera;
use super::{stub_param, CameraLocator, FrameSource, STUB_SCHEME};
use crate::frame::Frame;

/// Capture preferences for device cameras.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

pub struct CameraSource {
    locator: CameraLocator,
    backend: Option<CameraBackend>,
    frames_read: u64,
}

enum CameraBackend {
    Synthetic(SyntheticFeed),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Camera),
    #[cfg(feature = "ingest-ffmpeg")]
    Stream(FfmpegSource),
}

impl CameraSource {
    pub fn open(locator: &CameraLocator, settings: &CameraSettings) -> Result<Self> {
        let backend = match locator {
            CameraLocator::Named(name) if name.starts_with(STUB_SCHEME) => {
                CameraBackend::Synthetic(SyntheticFeed::new(name))
            }
            CameraLocator::Named(name) if name.trim().is_empty() => {
                return Err(anyhow!("camera identifier is empty"));
            }
            CameraLocator::Named(name) if name.contains("://") => open_stream(name)?,
            CameraLocator::Named(name) => open_device(name, settings)?,
            CameraLocator::Index(index) => open_device(&format!("/dev/video{}", index), settings)?,
        };
        log::info!("CameraSource: opened camera {}", locator);
        Ok(Self {
            locator: locator.clone(),
            backend: Some(backend),
            frames_read: 0,
        })
    }

    pub fn locator(&self) -> &CameraLocator {
        &self.locator
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: &str, settings: &CameraSettings) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(V4l2Camera::open(device, settings)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: &str, _settings: &CameraSettings) -> Result<CameraBackend> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        device
    ))
}

#[cfg(feature = "ingest-ffmpeg")]
fn open_stream(url: &str) -> Result<CameraBackend> {
    Ok(CameraBackend::Stream(FfmpegSource::open(url)?))
}

#[cfg(not(feature = "ingest-ffmpeg"))]
fn open_stream(url: &str) -> Result<CameraBackend> {
    Err(anyhow!(
        "camera stream {} requires the ingest-ffmpeg feature",
        url
    ))
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self.backend.as_mut() {
            None => return Err(anyhow!("camera {} already released", self.locator)),
            Some(CameraBackend::Synthetic(feed)) => feed.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            Some(CameraBackend::Device(device)) => device.next_frame()?,
            #[cfg(feature = "ingest-ffmpeg")]
            Some(CameraBackend::Stream(stream)) => stream
                .next_frame()?
                .ok_or_else(|| anyhow!("camera stream {} ended", self.locator))?,
        };
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            log::info!(
                "CameraSource: released camera {} after {} frames",
                self.locator,
                self.frames_read
            );
        }
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic feed (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFeed {
    scene: SyntheticScene,
    fail_after: Option<u64>,
}

impl SyntheticFeed {
    fn new(locator: &str) -> Self {
        Self {
            scene: SyntheticScene::from_locator(locator),
            fail_after: stub_param(locator, "fail_after"),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(limit) = self.fail_after {
            if self.scene.frame_count() >= limit {
                return Err(anyhow!("synthetic camera stopped delivering frames"));
            }
        }
        self.scene.next_frame()
    }
}
