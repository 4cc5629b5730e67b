//! Model registry — turns model-name tokens into `Forecaster` instances.
//!
//! The registry is populated once at start-up. Built-in tokens:
//! - `Naive`, `WindowAverage`: in-process baselines
//! - `AutoRNN`, `AutoLSTM`, `AutoGRU`, `AutoTCN`: hosted by the external
//!   bridge, which must be configured in [`ModelSettings`]
//!
//! Extra constructors can be registered under new tokens (tests use this to
//! inject doubles).

use std::collections::BTreeMap;

use super::baseline::{Naive, WindowAverage};
use super::bridge::{BridgeCommand, ExternalModel};
use super::Forecaster;

/// Auto-model tokens served by the bridge.
pub const BRIDGE_MODELS: [&str; 4] = ["AutoRNN", "AutoLSTM", "AutoGRU", "AutoTCN"];

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during model construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Model {0} needs the external bridge, but no bridge command is configured")]
    BridgeNotConfigured(String),
}

/// Construction-time settings shared by all models.
#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    pub bridge: Option<BridgeCommand>,
}

/// Boxed constructor stored in the registry.
pub type ModelConstructor =
    Box<dyn Fn(&ModelSettings) -> Result<Box<dyn Forecaster>, FactoryError> + Send + Sync>;

/// Token -> constructor map.
pub struct ModelRegistry {
    constructors: BTreeMap<String, ModelConstructor>,
}

impl ModelRegistry {
    /// A registry with no models.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the baselines and the bridge-hosted auto-models.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Naive::NAME, |_| Ok(Box::new(Naive::new())));
        registry.register(WindowAverage::NAME, |_| Ok(Box::new(WindowAverage::new())));
        for token in BRIDGE_MODELS {
            registry.register(token, move |settings| {
                let command = settings
                    .bridge
                    .clone()
                    .ok_or_else(|| FactoryError::BridgeNotConfigured(token.to_string()))?;
                Ok(Box::new(ExternalModel::new(token, command)))
            });
        }
        registry
    }

    /// Register (or replace) a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&ModelSettings) -> Result<Box<dyn Forecaster>, FactoryError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered tokens, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build one model.
    pub fn create(
        &self,
        name: &str,
        settings: &ModelSettings,
    ) -> Result<Box<dyn Forecaster>, FactoryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| FactoryError::UnknownModel(name.to_string()))?;
        constructor(settings)
    }

    /// Build every model in `names`, in order.
    pub fn create_all<S: AsRef<str>>(
        &self,
        names: &[S],
        settings: &ModelSettings,
    ) -> Result<Vec<Box<dyn Forecaster>>, FactoryError> {
        names
            .iter()
            .map(|name| self.create(name.as_ref(), settings))
            .collect()
    }

    /// Check that every name resolves, without building anything.
    pub fn check(&self, names: &[String], settings: &ModelSettings) -> Result<(), FactoryError> {
        for name in names {
            if !self.contains(name) {
                return Err(FactoryError::UnknownModel(name.clone()));
            }
            if BRIDGE_MODELS.contains(&name.as_str()) && settings.bridge.is_none() {
                return Err(FactoryError::BridgeNotConfigured(name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
