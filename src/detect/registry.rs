use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use super::backend::{EngineSettings, InferenceEngine};
use super::backends::StubLoader;

/// Produces engines for the model references it accepts.
pub trait EngineLoader: Send + Sync {
    /// Loader identifier.
    fn name(&self) -> &'static str;

    /// Returns true when this loader understands `model_ref`.
    fn accepts(&self, model_ref: &str) -> bool;

    /// Load the model. Called on the worker thread; may be slow.
    fn load(&self, model_ref: &str) -> Result<Box<dyn InferenceEngine>>;
}

/// Thread-safe registry of engine loaders.
///
/// Loaders are shared; every `load` call produces a fresh engine owned by the caller.
pub struct BackendRegistry {
    loaders: Vec<Arc<dyn EngineLoader>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
            default_name: None,
        }
    }

    /// Registry with the loaders compiled into this build.
    pub fn with_defaults(settings: EngineSettings) -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "backend-tract")]
        registry.register(super::backends::TractLoader::new(settings.clone()));
        registry.register(StubLoader::new(settings));
        registry
    }

    /// Register a loader. The first registered loader becomes the default.
    pub fn register<L: EngineLoader + 'static>(&mut self, loader: L) {
        let name = loader.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name);
        }
        self.loaders.push(Arc::new(loader));
    }

    /// Set default loader by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if self.get(name).is_none() {
            return Err(anyhow!("engine loader '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get loader by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn EngineLoader>> {
        self.loaders
            .iter()
            .find(|loader| loader.name() == name)
            .cloned()
    }

    /// List registered loaders in registration order.
    pub fn list(&self) -> Vec<String> {
        self.loaders
            .iter()
            .map(|loader| loader.name().to_string())
            .collect()
    }

    /// Select the loader for a model reference.
    ///
    /// Prefers the default loader when it accepts the reference.
    pub fn loader_for(&self, model_ref: &str) -> Result<Arc<dyn EngineLoader>> {
        if let Some(default_loader) = self.default_name.as_deref().and_then(|n| self.get(n)) {
            if default_loader.accepts(model_ref) {
                return Ok(default_loader);
            }
        }

        self.loaders
            .iter()
            .find(|loader| loader.accepts(model_ref))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "no registered engine loader accepts model reference '{}'",
                    model_ref
                )
            })
    }

    /// Load and warm up an engine for `model_ref`.
    pub fn load(&self, model_ref: &str) -> Result<Box<dyn InferenceEngine>> {
        if model_ref.trim().is_empty() {
            return Err(anyhow!("model reference is empty"));
        }
        let loader = self.loader_for(model_ref)?;
        let mut engine = loader
            .load(model_ref)
            .with_context(|| format!("{} loader failed for '{}'", loader.name(), model_ref))?;
        engine
            .warm_up()
            .with_context(|| format!("warm-up failed for '{}'", model_ref))?;
        log::info!("engine '{}' loaded from {}", engine.name(), model_ref);
        Ok(engine)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EngineSettings {
        EngineSettings::new(vec!["hole".to_string(), "rusty".to_string()])
    }

    #[test]
    fn loads_stub_references() -> Result<()> {
        let registry = BackendRegistry::with_defaults(settings());
        let engine = registry.load("stub://default")?;
        assert_eq!(engine.name(), "stub");
        assert_eq!(engine.class_names().len(), 2);
        Ok(())
    }

    #[test]
    fn unknown_reference_is_a_load_error() {
        let registry = BackendRegistry::with_defaults(settings());
        let err = registry
            .load("weights/best.pt")
            .err()
            .expect("load should fail");
        assert!(err.to_string().contains("no registered engine loader"));
    }

    #[test]
    fn empty_reference_is_rejected() {
        let registry = BackendRegistry::with_defaults(settings());
        assert!(registry.load("  ").is_err());
    }

    #[test]
    fn set_default_requires_registered_loader() {
        let mut registry = BackendRegistry::with_defaults(settings());
        assert!(registry.set_default("missing").is_err());
        assert!(registry.set_default("stub").is_ok());
        assert!(registry.list().contains(&"stub".to_string()));
    }
}
