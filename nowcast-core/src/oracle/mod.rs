//! Forecasting oracle — fits a set of models and predicts ahead.
//!
//! The pipeline treats model fitting as an opaque collaborator. This module
//! defines the contract:
//! - [`Forecaster`]: one model, fitted on a [`TrainingFrame`], predicting
//!   from a [`FutureFrame`]
//! - [`OracleSpec`]: horizon, covariate roles, search space, validation size
//! - [`ForecastOracle`]: fits every configured model and assembles a
//!   [`PredictionTable`] with one point-forecast column per model
//!
//! Models are constructed by name through [`factory::ModelRegistry`].

pub mod baseline;
pub mod bridge;
pub mod factory;
pub mod frequency;
pub mod search;

use std::io;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::frame::{FutureFrame, TrainingFrame};

pub use factory::{FactoryError, ModelRegistry, ModelSettings};
pub use frequency::Frequency;
pub use search::SearchSpace;

/// Errors raised while fitting or predicting.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no models configured")]
    NoModels,

    #[error("forecast horizon must be at least 1")]
    ZeroHorizon,

    #[error("training frame is empty")]
    EmptyTraining,

    #[error("covariate '{0}' is declared but not present in the frame")]
    MissingExog(String),

    #[error("predict called before fit")]
    NotFitted,

    #[error("future frame has {actual} row(s), expected {expected}")]
    FutureRows { expected: usize, actual: usize },

    #[error("model '{model}' failed: {message}")]
    Model { model: String, message: String },

    #[error("bridge for '{model}' could not start: {source}")]
    BridgeSpawn {
        model: String,
        #[source]
        source: io::Error,
    },

    #[error("bridge for '{model}' exited with {status}: {stderr}")]
    BridgeExit {
        model: String,
        status: String,
        stderr: String,
    },

    #[error("bridge for '{model}' returned malformed output: {message}")]
    BridgeOutput { model: String, message: String },

    #[error("bridge scratch directory I/O failed: {0}")]
    Scratch(#[from] io::Error),
}

/// Everything a model needs to know besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSpec {
    /// Number of periods to forecast.
    pub horizon: usize,
    pub frequency: Frequency,
    /// Covariates usable as history only.
    pub hist_exog: Vec<String>,
    /// Covariates known for the forecast rows.
    pub futr_exog: Vec<String>,
    pub search: SearchSpace,
    /// Search trials per auto-model.
    pub num_samples: usize,
    /// Trailing training periods held out for validation.
    pub val_size: usize,
}

/// One fitted-and-predicting model.
pub trait Forecaster: Send {
    /// Token used as the prediction column name.
    fn name(&self) -> &str;

    fn fit(&mut self, train: &TrainingFrame, spec: &OracleSpec) -> Result<(), OracleError>;

    /// Point forecasts for `horizon` steps. Must return exactly `horizon`
    /// values.
    fn predict(&self, futr: &FutureFrame, horizon: usize) -> Result<Vec<f64>, OracleError>;
}

/// One row of oracle output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub unique_id: String,
    pub ds: NaiveDate,
    /// Point forecasts, aligned with [`PredictionTable::model_names`].
    pub values: Vec<f64>,
}

/// Oracle output: one row per identifier per forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    pub model_names: Vec<String>,
    pub rows: Vec<PredictionRow>,
}

impl PredictionTable {
    /// Move every timestamp forward by `days`.
    pub fn shift_days(&mut self, days: u64) {
        for row in &mut self.rows {
            row.ds = row.ds + Days::new(days);
        }
    }

    /// Point forecasts of the first row, one per model.
    pub fn first_row_values(&self) -> Vec<f64> {
        self.rows.first().map(|r| r.values.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct FitState {
    unique_id: String,
    last_ds: NaiveDate,
}

/// Fits a set of models on one training frame and predicts ahead.
pub struct ForecastOracle {
    models: Vec<Box<dyn Forecaster>>,
    spec: OracleSpec,
    fitted: Option<FitState>,
}

impl ForecastOracle {
    pub fn new(models: Vec<Box<dyn Forecaster>>, spec: OracleSpec) -> Result<Self, OracleError> {
        if models.is_empty() {
            return Err(OracleError::NoModels);
        }
        if spec.horizon == 0 {
            return Err(OracleError::ZeroHorizon);
        }
        Ok(Self {
            models,
            spec,
            fitted: None,
        })
    }

    pub fn spec(&self) -> &OracleSpec {
        &self.spec
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    /// Fit every model. Declared covariates must all be present.
    pub fn fit(&mut self, train: &TrainingFrame) -> Result<(), OracleError> {
        let last_ds = train.last_ds().ok_or(OracleError::EmptyTraining)?;
        for name in self.spec.hist_exog.iter().chain(&self.spec.futr_exog) {
            if train.exog.column(name).is_none() {
                return Err(OracleError::MissingExog(name.clone()));
            }
        }
        for model in &mut self.models {
            debug!(model = model.name(), rows = train.rows(), "fitting model");
            model.fit(train, &self.spec)?;
        }
        self.fitted = Some(FitState {
            unique_id: train.unique_id.clone(),
            last_ds,
        });
        Ok(())
    }

    /// Predict `horizon` steps. Timestamps are period-end labels after the
    /// last training timestamp.
    pub fn predict(&self, futr: &FutureFrame) -> Result<PredictionTable, OracleError> {
        let state = self.fitted.as_ref().ok_or(OracleError::NotFitted)?;
        let horizon = self.spec.horizon;
        if futr.rows() != horizon {
            return Err(OracleError::FutureRows {
                expected: horizon,
                actual: futr.rows(),
            });
        }
        for name in &self.spec.futr_exog {
            if futr.exog.column(name).is_none() {
                return Err(OracleError::MissingExog(name.clone()));
            }
        }

        let mut per_model = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let values = model.predict(futr, horizon)?;
            if values.len() != horizon {
                return Err(OracleError::Model {
                    model: model.name().to_string(),
                    message: format!("returned {} forecasts for horizon {horizon}", values.len()),
                });
            }
            per_model.push(values);
        }

        let labels = self.spec.frequency.forecast_labels(state.last_ds, horizon);
        let rows = labels
            .into_iter()
            .enumerate()
            .map(|(step, ds)| PredictionRow {
                unique_id: state.unique_id.clone(),
                ds,
                values: per_model.iter().map(|v| v[step]).collect(),
            })
            .collect();

        Ok(PredictionTable {
            model_names: self.model_names(),
            rows,
        })
    }
}
