use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::cancel::CancelToken;
use super::event::{RunError, WorkerEvent};
use super::handle::WorkerHandle;
use super::request::{DetectionRequest, SourceKind};
use crate::detect::{BackendRegistry, InferenceEngine};
use crate::frame::Frame;
use crate::ingest::{CameraLocator, FrameSource, SourceProvider};
use crate::report::{format_result, ClassMap, ImageId, RankedResultSet, ResultTable};

pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(30);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

const VIDEO_COMPLETED: &str = "Video processing completed.";
const VIDEO_IN_PROGRESS: &str = "Video processing in progress...";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Pause after each video frame.
    pub frame_delay: Duration,
    /// Bound of the event queue.
    pub channel_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            frame_delay: DEFAULT_FRAME_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Spawns detection runs.
///
/// Shared collaborators live here; each `spawn` gets its own engine, source
/// handle, event queue and cancel token.
#[derive(Clone)]
pub struct DetectionWorker {
    registry: Arc<BackendRegistry>,
    sources: Arc<dyn SourceProvider>,
    classes: Arc<ClassMap>,
    settings: WorkerSettings,
}

impl DetectionWorker {
    pub fn new(
        registry: Arc<BackendRegistry>,
        sources: Arc<dyn SourceProvider>,
        classes: Arc<ClassMap>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            registry,
            sources,
            classes,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Start a run on a dedicated thread.
    pub fn spawn(&self, request: DetectionRequest) -> Result<WorkerHandle> {
        let (sender, receiver) = sync_channel(self.settings.channel_capacity.max(1));
        let cancel = CancelToken::new();
        let label = request.source().to_string();
        let run = RunContext {
            registry: self.registry.clone(),
            sources: self.sources.clone(),
            classes: self.classes.clone(),
            frame_delay: self.settings.frame_delay,
            cancel: cancel.clone(),
            events: sender,
            request,
        };
        let join = std::thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || run.run())
            .context("spawn detection worker thread")?;
        log::info!("detection worker started for {}", label);
        Ok(WorkerHandle::new(label, receiver, cancel, join))
    }
}

/// How a frame loop ended.
enum LoopEnd {
    Exhausted,
    Cancelled,
    /// The owner dropped its receiver.
    Disconnected,
    Failed(RunError),
}

struct RunContext {
    registry: Arc<BackendRegistry>,
    sources: Arc<dyn SourceProvider>,
    classes: Arc<ClassMap>,
    frame_delay: Duration,
    cancel: CancelToken,
    events: SyncSender<WorkerEvent>,
    request: DetectionRequest,
}

impl RunContext {
    fn run(self) {
        let mut engine = match self.registry.load(self.request.model()) {
            Ok(engine) => engine,
            Err(err) => {
                self.fail(RunError::EngineLoad {
                    model: self.request.model().to_string(),
                    reason: format!("{:#}", err),
                });
                return;
            }
        };
        log::info!(
            "using model {} ({}) for {}",
            self.request.model_file_name(),
            engine.name(),
            self.request.source()
        );

        match self.request.source().clone() {
            SourceKind::Image { path } => self.run_image(engine.as_mut(), &path),
            SourceKind::Video { path } => self.run_video(engine.as_mut(), &path),
            SourceKind::Camera { locator } => self.run_camera(engine.as_mut(), &locator),
        }
    }

    /// Single shot; a stop request has no effect here.
    fn run_image(&self, engine: &mut dyn InferenceEngine, path: &str) {
        let frame = match self.sources.open_image(path) {
            Ok(frame) => frame,
            Err(err) => return self.fail(source_open(path, err)),
        };
        match self.process(engine, frame, &ImageId::from_image_path(path)) {
            Ok((annotated, table)) => {
                let summary = table.to_string();
                if self.publish(annotated, table) {
                    self.emit(WorkerEvent::RunFinished { summary });
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn run_video(&self, engine: &mut dyn InferenceEngine, path: &str) {
        let mut source = match self.sources.open_video(path) {
            Ok(source) => source,
            Err(err) => return self.fail(source_open(path, err)),
        };
        let mut last_summary = None;
        let end = self.frame_loop(
            engine,
            source.as_mut(),
            path,
            &ImageId::VideoFrame,
            Some(self.frame_delay),
            &mut last_summary,
        );
        source.release();

        match end {
            LoopEnd::Exhausted => {
                let last = last_summary.unwrap_or_else(|| VIDEO_IN_PROGRESS.to_string());
                log::info!("video {} completed after {} frames", path, source.frames_read());
                self.emit(WorkerEvent::RunFinished {
                    summary: format!("{}\n{}", VIDEO_COMPLETED, last),
                });
            }
            LoopEnd::Failed(err) => self.fail(err),
            LoopEnd::Cancelled | LoopEnd::Disconnected => {
                log::info!("video {} stopped after {} frames", path, source.frames_read());
            }
        }
    }

    /// Camera runs never finish on their own; they end by stop or read failure.
    fn run_camera(&self, engine: &mut dyn InferenceEngine, locator: &CameraLocator) {
        let name = locator.to_string();
        let mut source = match self.sources.open_camera(locator) {
            Ok(source) => source,
            Err(err) => return self.fail(source_open(&name, err)),
        };
        let mut last_summary = None;
        let end = self.frame_loop(
            engine,
            source.as_mut(),
            &name,
            &ImageId::CameraFrame,
            None,
            &mut last_summary,
        );
        source.release();

        match end {
            LoopEnd::Exhausted => self.fail(RunError::FrameRead {
                locator: name,
                reason: "camera stopped delivering frames".to_string(),
            }),
            LoopEnd::Failed(err) => self.fail(err),
            LoopEnd::Cancelled | LoopEnd::Disconnected => {
                log::info!("camera {} stopped after {} frames", name, source.frames_read());
            }
        }
    }

    fn frame_loop(
        &self,
        engine: &mut dyn InferenceEngine,
        source: &mut dyn FrameSource,
        locator: &str,
        image_id: &ImageId,
        pace: Option<Duration>,
        last_summary: &mut Option<String>,
    ) -> LoopEnd {
        loop {
            if self.cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return LoopEnd::Exhausted,
                Err(err) => {
                    return LoopEnd::Failed(RunError::FrameRead {
                        locator: locator.to_string(),
                        reason: format!("{:#}", err),
                    })
                }
            };
            let (annotated, table) = match self.process(engine, frame, image_id) {
                Ok(output) => output,
                Err(err) => return LoopEnd::Failed(err),
            };
            *last_summary = Some(table.to_string());
            if !self.publish(annotated, table) {
                return LoopEnd::Disconnected;
            }
            if let Some(delay) = pace {
                std::thread::sleep(delay);
            }
        }
    }

    /// Infer, keep the top boxes, format, then annotate. Nothing is emitted
    /// for a frame whose table cannot be formatted.
    fn process(
        &self,
        engine: &mut dyn InferenceEngine,
        frame: Frame,
        image_id: &ImageId,
    ) -> Result<(Frame, ResultTable), RunError> {
        let sequence = frame.sequence;
        let mut result =
            engine
                .infer(frame, self.request.thresholds())
                .map_err(|err| RunError::Inference {
                    reason: format!("{:#}", err),
                })?;
        let ranked = RankedResultSet::from_boxes(std::mem::take(&mut result.boxes));
        result.replace_boxes(ranked.into_boxes());

        let table = format_result(image_id, &result, &self.classes)?;
        let annotated = result.annotate().map_err(|err| RunError::Inference {
            reason: format!("annotate frame {}: {:#}", sequence, err),
        })?;
        log::debug!(
            "frame {} of {}: {} boxes kept",
            sequence,
            image_id,
            table.rows().len()
        );
        Ok((annotated, table))
    }

    fn publish(&self, annotated: Frame, table: ResultTable) -> bool {
        self.emit(WorkerEvent::FrameReady(annotated)) && self.emit(WorkerEvent::ResultReady(table))
    }

    /// False when the owner is gone.
    fn emit(&self, event: WorkerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn fail(&self, err: RunError) {
        log::warn!("detection run for {} failed: {}", self.request.source(), err);
        self.emit(WorkerEvent::RunFailed(err));
    }
}

fn source_open(locator: &str, err: anyhow::Error) -> RunError {
    RunError::SourceOpen {
        locator: locator.to_string(),
        reason: format!("{:#}", err),
    }
}
