//! Run configuration, loaded from TOML.
//!
//! Every field has a default, and the defaults reproduce the reference run:
//! vintages May 2018 through February 2023, the three recurrent auto-models,
//! a checkpoint after every vintage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nowcast_core::data::LoadOptions;
use nowcast_core::oracle::bridge::BridgeCommand;
use nowcast_core::oracle::{Frequency, ModelSettings, SearchSpace};

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to do when one vintage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and continue with the next vintage.
    #[default]
    Skip,
    /// Checkpoint what has accumulated and stop the run.
    Abort,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NowcastConfig {
    pub on_error: FailurePolicy,
    pub data: DataConfig,
    pub vintages: VintageConfig,
    pub models: ModelsConfig,
    pub output: OutputConfig,
}

/// Where vintage files live and how their columns map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub series_id: String,
    pub timestamp_column: String,
    pub target_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        let load = LoadOptions::default();
        Self {
            dir: PathBuf::from("data/FRED/blocked"),
            series_id: load.series_id,
            timestamp_column: load.timestamp_column,
            target_column: load.target_column,
        }
    }
}

impl DataConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            series_id: self.series_id.clone(),
            timestamp_column: self.timestamp_column.clone(),
            target_column: self.target_column.clone(),
        }
    }
}

/// Which vintages to process.
///
/// Every month of every year in `start_year..=end_year`, minus the months
/// before `first_month` in the first year and after `last_month` in the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VintageConfig {
    pub start_year: i32,
    pub end_year: i32,
    pub first_month: u32,
    pub last_month: u32,
    pub file_prefix: String,
}

impl Default for VintageConfig {
    fn default() -> Self {
        Self {
            start_year: 2018,
            end_year: 2023,
            first_month: 5,
            last_month: 2,
            file_prefix: "vintage".to_string(),
        }
    }
}

/// Model set and search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Registry tokens, in output column order.
    pub names: Vec<String>,
    /// Search trials per auto-model.
    pub num_samples: usize,
    pub frequency: Frequency,
    /// Share of training timestamps held out for validation.
    pub val_fraction: f64,
    /// Bridge command line (program first). Required for `Auto*` models.
    pub bridge: Vec<String>,
    pub search: SearchSpace,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            names: vec!["AutoRNN".into(), "AutoLSTM".into(), "AutoGRU".into()],
            num_samples: 30,
            frequency: Frequency::Quarterly,
            val_fraction: 0.2,
            bridge: Vec::new(),
            search: SearchSpace::default(),
        }
    }
}

impl ModelsConfig {
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            bridge: BridgeCommand::from_argv(&self.bridge),
        }
    }
}

/// Checkpoint output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prefix: String,
    /// Vintages per checkpoint.
    pub block_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prelim_results"),
            prefix: "rnn_results".to_string(),
            block_size: 1,
        }
    }
}

impl NowcastConfig {
    /// Load a config from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let v = &self.vintages;
        if v.start_year > v.end_year {
            return invalid(format!(
                "vintages.start_year {} is after end_year {}",
                v.start_year, v.end_year
            ));
        }
        for (field, month) in [("first_month", v.first_month), ("last_month", v.last_month)] {
            if !(1..=12).contains(&month) {
                return invalid(format!("vintages.{field} must be 1-12, got {month}"));
            }
        }
        if v.start_year == v.end_year && v.first_month > v.last_month {
            return invalid("vintages.first_month is after last_month in a single-year range".into());
        }
        if self.output.block_size == 0 {
            return invalid("output.block_size must be at least 1".into());
        }
        if self.models.names.is_empty() {
            return invalid("models.names must list at least one model".into());
        }
        if !(0.0..1.0).contains(&self.models.val_fraction) {
            return invalid(format!(
                "models.val_fraction must be in [0, 1), got {}",
                self.models.val_fraction
            ));
        }
        if let Some(field) = self.models.search.first_empty() {
            return invalid(format!("models.search.{field} has no candidates"));
        }
        Ok(())
    }
}
