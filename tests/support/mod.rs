//! Scripted engine and sources shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use container_inspect::detect::{
    Annotator, BackendRegistry, DetectionBox, DetectionResult, EngineLoader, InferenceEngine,
    Thresholds,
};
use container_inspect::ingest::{CameraLocator, FrameSource, SourceProvider};
use container_inspect::{ClassMap, DetectionWorker, Frame, WorkerSettings};

pub const SCRIPTED_MODEL: &str = "scripted://best.onnx";
pub const FRAME_EDGE: u32 = 16;

pub fn frame(sequence: u64) -> Frame {
    let len = (FRAME_EDGE * FRAME_EDGE * 3) as usize;
    Frame::new(vec![(sequence % 251) as u8; len], FRAME_EDGE, FRAME_EDGE, sequence)
        .expect("frame")
}

pub fn bbox(confidence: f32, class_index: usize) -> DetectionBox {
    DetectionBox {
        confidence,
        class_index,
        x_center: 8.0,
        y_center: 4.0,
        width: 8.0,
        height: 4.0,
    }
}

// ----------------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct ScriptedEngineSpec {
    pub names: Vec<String>,
    pub boxes: Vec<DetectionBox>,
    pub infer_calls: Arc<AtomicUsize>,
    /// Every `infer` call returns an error.
    pub fail_infer: bool,
}

impl ScriptedEngineSpec {
    pub fn new(names: &[&str], boxes: Vec<DetectionBox>) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            boxes,
            infer_calls: Arc::new(AtomicUsize::new(0)),
            fail_infer: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_infer = true;
        self
    }

    pub fn infer_calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }
}

struct ScriptedEngine {
    spec: ScriptedEngineSpec,
    names: Arc<[String]>,
    annotator: Arc<Annotator>,
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn class_names(&self) -> &[String] {
        &self.names
    }

    fn infer(&mut self, frame: Frame, _thresholds: Thresholds) -> Result<DetectionResult> {
        self.spec.infer_calls.fetch_add(1, Ordering::SeqCst);
        if self.spec.fail_infer {
            return Err(anyhow!("tensor shape mismatch"));
        }
        Ok(DetectionResult::new(
            frame,
            self.spec.boxes.clone(),
            self.names.clone(),
            self.annotator.clone(),
        ))
    }
}

struct ScriptedLoader {
    spec: ScriptedEngineSpec,
}

impl EngineLoader for ScriptedLoader {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn accepts(&self, model_ref: &str) -> bool {
        model_ref.starts_with("scripted://")
    }

    fn load(&self, _model_ref: &str) -> Result<Box<dyn InferenceEngine>> {
        Ok(Box::new(ScriptedEngine {
            names: self.spec.names.clone().into(),
            spec: self.spec.clone(),
            annotator: Arc::new(Annotator::default()),
        }))
    }
}

// ----------------------------------------------------------------------------
// Sources
// ----------------------------------------------------------------------------

/// Shape of every source the provider opens.
#[derive(Clone, Debug, Default)]
pub struct SourceScript {
    /// `None` never runs out.
    pub frames: Option<u64>,
    /// Reads beyond this count fail.
    pub fail_after: Option<u64>,
    pub fail_open: bool,
}

#[derive(Clone, Default)]
pub struct SourceProbe {
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
    pub reads: Arc<AtomicU64>,
}

impl SourceProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSources {
    pub script: SourceScript,
    pub probe: SourceProbe,
}

struct ScriptedSource {
    script: SourceScript,
    probe: SourceProbe,
    released: bool,
    read: u64,
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Err(anyhow!("source already released"));
        }
        if let Some(limit) = self.script.fail_after {
            if self.read >= limit {
                return Err(anyhow!("device unplugged"));
            }
        }
        if let Some(total) = self.script.frames {
            if self.read >= total {
                return Ok(None);
            }
        }
        self.read += 1;
        self.probe.reads.store(self.read, Ordering::SeqCst);
        Ok(Some(frame(self.read)))
    }

    fn release(&mut self) {
        self.released = true;
        self.probe.released.store(true, Ordering::SeqCst);
    }

    fn frames_read(&self) -> u64 {
        self.read
    }
}

impl ScriptedSources {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        if self.script.fail_open {
            return Err(anyhow!("no such file or device"));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource {
            script: self.script.clone(),
            probe: self.probe.clone(),
            released: false,
            read: 0,
        }))
    }
}

impl SourceProvider for ScriptedSources {
    fn open_image(&self, _path: &str) -> Result<Frame> {
        if self.script.fail_open {
            return Err(anyhow!("cannot decode image"));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(frame(1))
    }

    fn open_video(&self, _path: &str) -> Result<Box<dyn FrameSource>> {
        self.open()
    }

    fn open_camera(&self, _locator: &CameraLocator) -> Result<Box<dyn FrameSource>> {
        self.open()
    }
}

// ----------------------------------------------------------------------------
// Wiring
// ----------------------------------------------------------------------------

pub struct Harness {
    pub worker: DetectionWorker,
    pub engine: ScriptedEngineSpec,
    pub probe: SourceProbe,
}

pub fn harness(engine: ScriptedEngineSpec, script: SourceScript, frame_delay: Duration) -> Harness {
    let mut registry = BackendRegistry::new();
    registry.register(ScriptedLoader {
        spec: engine.clone(),
    });
    let probe = SourceProbe::default();
    let sources = ScriptedSources {
        script,
        probe: probe.clone(),
    };
    let worker = DetectionWorker::new(
        Arc::new(registry),
        Arc::new(sources),
        Arc::new(ClassMap::default()),
        WorkerSettings {
            frame_delay,
            channel_capacity: 4,
        },
    );
    Harness {
        worker,
        engine,
        probe,
    }
}

pub fn damage_engine() -> ScriptedEngineSpec {
    ScriptedEngineSpec::new(
        &["hole", "broken", "rusty", "scratch", "sd", "hd", "vd"],
        vec![
            bbox(0.30, 0),
            bbox(0.91, 2),
            bbox(0.55, 3),
            bbox(0.55, 1),
            bbox(0.72, 4),
        ],
    )
}
