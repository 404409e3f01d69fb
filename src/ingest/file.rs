//! Local video file source.
//!
//! `VideoFileSource` reads a finite sequence of frames from a local video
//! file. It is responsible for:
//! - Rejecting remote URLs (video runs are local-only; streams go through cameras)
//! - Decoding frames in-memory into RGB24
//! - Reporting exhaustion as `Ok(None)` so the worker can finalize the run
//!
//! `stub://name?frames=N` produces a synthetic clip of N frames (default 30).

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-ffmpeg")]
use super::ffmpeg::FfmpegSource;
use super::synthetic::SyntheticScene;
use super::{stub_param, FrameSource, STUB_SCHEME};
use crate::frame::Frame;

const DEFAULT_STUB_FRAMES: u64 = 30;

/// Local file frame source.
pub struct VideoFileSource {
    path: String,
    backend: Option<FileBackend>,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegSource),
}

impl VideoFileSource {
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "video runs only support local files (got '{}')",
                path
            ));
        }
        let backend = if path.starts_with(STUB_SCHEME) {
            FileBackend::Synthetic(SyntheticClip::new(path))
        } else {
            if !std::path::Path::new(path).is_file() {
                return Err(anyhow!("video file {} does not exist", path));
            }
            open_decoder(path)?
        };
        log::info!("VideoFileSource: opened {}", path);
        Ok(Self {
            path: path.to_string(),
            backend: Some(backend),
            frames_read: 0,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.backend.is_none()
    }
}

#[cfg(feature = "ingest-ffmpeg")]
fn open_decoder(path: &str) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegSource::open(path)?))
}

#[cfg(not(feature = "ingest-ffmpeg"))]
fn open_decoder(_path: &str) -> Result<FileBackend> {
    Err(anyhow!("video decoding requires the ingest-ffmpeg feature"))
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self.backend.as_mut() {
            None => return Err(anyhow!("video source {} already released", self.path)),
            Some(FileBackend::Synthetic(clip)) => clip.next_frame()?,
            #[cfg(feature = "ingest-ffmpeg")]
            Some(FileBackend::Ffmpeg(decoder)) => decoder.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            log::info!(
                "VideoFileSource: released {} after {} frames",
                self.path,
                self.frames_read
            );
        }
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticClip {
    scene: SyntheticScene,
    total_frames: u64,
}

impl SyntheticClip {
    fn new(path: &str) -> Self {
        Self {
            scene: SyntheticScene::from_locator(path),
            total_frames: stub_param(path, "frames").unwrap_or(DEFAULT_STUB_FRAMES),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.scene.frame_count() >= self.total_frames {
            return Ok(None);
        }
        self.scene.next_frame().map(Some)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
