use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{Annotator, EngineSettings, Thresholds, DEFAULT_CONFIDENCE, DEFAULT_IOU};
use crate::ingest::{CameraSettings, LocalSources};
use crate::report::ClassMap;
use crate::worker::{WorkerSettings, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_DELAY};

const DEFAULT_DB_PATH: &str = "inspect.db";
const DEFAULT_MODEL: &str = "stub://default";
const DEFAULT_THICKNESS: u32 = 2;

pub const ENV_CONFIG: &str = "INSPECT_CONFIG";
pub const ENV_DB_PATH: &str = "INSPECT_DB_PATH";
pub const ENV_MODEL: &str = "INSPECT_MODEL";
pub const ENV_CONFIDENCE: &str = "INSPECT_CONFIDENCE";
pub const ENV_IOU: &str = "INSPECT_IOU";
pub const ENV_FRAME_DELAY_MS: &str = "INSPECT_FRAME_DELAY_MS";
pub const ENV_CLASS_MAP: &str = "INSPECT_CLASS_MAP";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct InspectConfigFile {
    db_path: Option<String>,
    model: Option<String>,
    thresholds: Option<ThresholdsConfigFile>,
    classes: Option<ClassesConfigFile>,
    worker: Option<WorkerConfigFile>,
    annotation: Option<AnnotationConfigFile>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    confidence: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassesConfigFile {
    map: Option<BTreeMap<String, u32>>,
    /// Model class table; defaults to the map's labels ordered by index.
    names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkerConfigFile {
    frame_delay_ms: Option<u64>,
    channel_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotationConfigFile {
    font_path: Option<PathBuf>,
    thickness: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct InspectConfig {
    pub db_path: String,
    pub model: String,
    pub thresholds: Thresholds,
    pub classes: ClassMap,
    pub class_names: Vec<String>,
    pub worker: WorkerSettings,
    pub annotation: AnnotationSettings,
    pub camera: CameraSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSettings {
    pub font_path: Option<PathBuf>,
    pub thickness: u32,
}

impl InspectConfig {
    /// Defaults, then the file named by `INSPECT_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(ENV_CONFIG).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: InspectConfigFile) -> Self {
        let thresholds = file.thresholds.unwrap_or_default();
        let classes = file.classes.unwrap_or_default();
        let worker = file.worker.unwrap_or_default();
        let annotation = file.annotation.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let camera_defaults = CameraSettings::default();

        let class_map = classes.map.map(ClassMap::new).unwrap_or_default();
        let class_names = classes
            .names
            .unwrap_or_else(|| class_map.labels_by_index());

        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            thresholds: Thresholds {
                confidence: thresholds.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                iou: thresholds.iou.unwrap_or(DEFAULT_IOU),
            },
            classes: class_map,
            class_names,
            worker: WorkerSettings {
                frame_delay: worker
                    .frame_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_FRAME_DELAY),
                channel_capacity: worker.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            },
            annotation: AnnotationSettings {
                font_path: annotation.font_path,
                thickness: annotation.thickness.unwrap_or(DEFAULT_THICKNESS),
            },
            camera: CameraSettings {
                width: camera.width.unwrap_or(camera_defaults.width),
                height: camera.height.unwrap_or(camera_defaults.height),
                target_fps: camera.target_fps.unwrap_or(camera_defaults.target_fps),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        if let Ok(value) = std::env::var(ENV_CONFIDENCE) {
            self.thresholds.confidence = parse_env(ENV_CONFIDENCE, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_IOU) {
            self.thresholds.iou = parse_env(ENV_IOU, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_FRAME_DELAY_MS) {
            self.worker.frame_delay = Duration::from_millis(parse_env(ENV_FRAME_DELAY_MS, &value)?);
        }
        if let Ok(value) = std::env::var(ENV_CLASS_MAP) {
            if !value.trim().is_empty() {
                self.classes = ClassMap::parse(&value)
                    .with_context(|| format!("{} is invalid", ENV_CLASS_MAP))?;
                self.class_names = self.classes.labels_by_index();
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.thresholds = Thresholds::new(self.thresholds.confidence, self.thresholds.iou)?;
        if self.classes.is_empty() {
            return Err(anyhow!("class map must not be empty"));
        }
        if self.class_names.is_empty() {
            return Err(anyhow!("model class names must not be empty"));
        }
        if self.worker.channel_capacity == 0 {
            return Err(anyhow!("worker channel capacity must be greater than zero"));
        }
        if self.annotation.thickness == 0 {
            return Err(anyhow!("annotation thickness must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        Ok(())
    }

    /// Settings handed to every engine loader.
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let mut annotator = Annotator::new(self.annotation.thickness);
        if let Some(path) = &self.annotation.font_path {
            annotator = annotator.with_font_file(path)?;
        }
        Ok(EngineSettings::new(self.class_names.clone()).with_annotator(annotator))
    }

    pub fn local_sources(&self) -> LocalSources {
        LocalSources::new(self.camera.clone())
    }
}

fn read_config_file(path: &Path) -> Result<InspectConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} has an invalid value '{}'", key, value))
}
