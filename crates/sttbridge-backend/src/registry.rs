use crate::backend_trait::SpeechBackend;
use std::collections::HashMap;
use sttbridge_core::BackendError;

pub struct BackendRegistry {
    factories: HashMap<String, fn() -> Box<dyn SpeechBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", || Box::new(crate::null_backend::NullBackend::new()));
        #[cfg(feature = "google")]
        registry.register("google", || {
            Box::new(crate::google::GoogleBackend::new())
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Box<dyn SpeechBackend>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn SpeechBackend>, BackendError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    /// Create and initialise a backend in one step.
    pub async fn build(
        &self,
        name: &str,
        config: toml::Value,
    ) -> Result<Box<dyn SpeechBackend>, BackendError> {
        let mut backend = self.create(name)?;
        backend.initialize(config).await?;
        tracing::info!(backend = %backend.name(), "speech backend initialized");
        Ok(backend)
    }

    pub fn list_backends(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
