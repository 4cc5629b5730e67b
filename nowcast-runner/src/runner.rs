//! Per-vintage forecasting — wires together loading, splitting, imputation and the oracle.
//!
//! Two entry points:
//! - `prepare_frames()`: pure table work, turns a loaded vintage into the
//!   training frame and the one-row prediction frame.
//! - `VintageForecastRunner::forecast()`: loads a vintage file, prepares the
//!   frames, fits the configured models and returns the shifted prediction.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use nowcast_core::covariates::{cutoff_index, split_covariates};
use nowcast_core::data::{load_vintage, LoadError, LoadOptions};
use nowcast_core::frame::{FutureFrame, TrainingFrame, VintageTable};
use nowcast_core::impute::impute;
use nowcast_core::oracle::{
    FactoryError, ForecastOracle, Frequency, ModelRegistry, ModelSettings, OracleError,
    OracleSpec, PredictionTable, SearchSpace,
};
use nowcast_core::schema::SchemaError;

use crate::config::NowcastConfig;
use crate::vintage::{vintage_id_from_path, Vintage};

/// Forecast horizon, in periods.
pub const HORIZON: usize = 1;

/// Days added to the oracle's period-end label so the forecast is stamped
/// with the start of the period it covers.
pub const TIMESTAMP_SHIFT_DAYS: u64 = 1;

/// Broad failure class, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Schema,
    Oracle,
}

/// Errors from processing a single vintage. Every variant names the vintage.
#[derive(Debug, Error)]
pub enum VintageError {
    #[error("vintage {vintage}: {source}")]
    Load {
        vintage: String,
        #[source]
        source: LoadError,
    },

    #[error("vintage {vintage}: {source}")]
    Schema {
        vintage: String,
        #[source]
        source: SchemaError,
    },

    #[error("vintage {vintage}: model construction failed: {source}")]
    Factory {
        vintage: String,
        #[source]
        source: FactoryError,
    },

    #[error("vintage {vintage}: forecasting failed: {source}")]
    Oracle {
        vintage: String,
        #[source]
        source: OracleError,
    },
}

impl VintageError {
    pub fn vintage(&self) -> &str {
        match self {
            VintageError::Load { vintage, .. }
            | VintageError::Schema { vintage, .. }
            | VintageError::Factory { vintage, .. }
            | VintageError::Oracle { vintage, .. } => vintage,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            VintageError::Load { source, .. } if source.is_io() => FailureKind::Io,
            VintageError::Load { .. } | VintageError::Schema { .. } => FailureKind::Schema,
            VintageError::Factory { .. } | VintageError::Oracle { .. } => FailureKind::Oracle,
        }
    }
}

/// Training and prediction frames for one vintage.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFrames {
    pub cutoff: usize,
    /// Covariates usable as history only.
    pub past_known: Vec<String>,
    /// Covariates observed through the forecast row.
    pub future_known: Vec<String>,
    /// All rows but the last; target, future-known then past-known covariates.
    pub training: TrainingFrame,
    /// The last row; future-known covariates only, no target.
    pub future: FutureFrame,
}

/// Split, impute and cut a loaded vintage into oracle inputs.
pub fn prepare_frames(table: &VintageTable) -> Result<PreparedFrames, SchemaError> {
    let rows = table.rows();
    let cutoff = cutoff_index(rows)?;
    let split = split_covariates(&table.covariates, cutoff)?;
    let past_known = split.past_names();
    let future_known = split.future_names();

    let future_cov = impute(&split.future);
    let past_cov = impute(&split.past);

    let last = rows - 1;
    let exog = future_cov.clone().hconcat(past_cov)?.slice_rows(0..last);
    let y = table.y[..last]
        .iter()
        .enumerate()
        .map(|(row, v)| v.ok_or(SchemaError::MissingTarget { row }))
        .collect::<Result<Vec<f64>, _>>()?;

    let training = TrainingFrame {
        unique_id: table.unique_id.clone(),
        ds: table.ds[..last].to_vec(),
        y,
        exog,
    };
    let future = FutureFrame {
        unique_id: table.unique_id.clone(),
        ds: vec![table.ds[last]],
        exog: future_cov.slice_rows(last..rows),
    };

    Ok(PreparedFrames {
        cutoff,
        past_known,
        future_known,
        training,
        future,
    })
}

/// Validation hold-out: `floor(fraction * distinct training timestamps)`.
pub fn validation_size(training: &TrainingFrame, fraction: f64) -> usize {
    (fraction * training.distinct_timestamps() as f64).floor() as usize
}

/// Result of forecasting one vintage.
#[derive(Debug, Clone)]
pub struct VintageForecast {
    pub vintage_id: String,
    /// BLAKE3 digest of the vintage file.
    pub fingerprint: String,
    /// Oracle output with timestamps already shifted.
    pub predictions: PredictionTable,
    /// `vintage_id -> point forecasts`, one per model in model order.
    pub results: BTreeMap<String, Vec<f64>>,
    pub past_known: Vec<String>,
    pub future_known: Vec<String>,
    pub elapsed: Duration,
}

/// Oracle settings shared by every vintage of a run.
#[derive(Debug, Clone)]
pub struct ForecastSettings {
    pub load: LoadOptions,
    pub model_names: Vec<String>,
    pub model_settings: ModelSettings,
    pub frequency: Frequency,
    pub search: SearchSpace,
    pub num_samples: usize,
    pub val_fraction: f64,
}

impl ForecastSettings {
    pub fn from_config(config: &NowcastConfig) -> Self {
        Self {
            load: config.data.load_options(),
            model_names: config.models.names.clone(),
            model_settings: config.models.model_settings(),
            frequency: config.models.frequency,
            search: config.models.search.clone(),
            num_samples: config.models.num_samples,
            val_fraction: config.models.val_fraction,
        }
    }
}

/// Runs the full pipeline for one vintage at a time.
pub struct VintageForecastRunner<'a> {
    registry: &'a ModelRegistry,
    settings: ForecastSettings,
}

impl<'a> VintageForecastRunner<'a> {
    pub fn new(registry: &'a ModelRegistry, settings: ForecastSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.registry
    }

    /// Forecast the vintage stored at `vintage.path`. Results and errors are
    /// labelled with the file's base name.
    pub fn forecast(&self, vintage: &Vintage) -> Result<VintageForecast, VintageError> {
        self.forecast_path(&vintage_id_from_path(&vintage.path), &vintage.path)
    }

    /// Forecast a vintage file, labelling errors and results with `vintage_id`.
    pub fn forecast_path(
        &self,
        vintage_id: &str,
        path: &Path,
    ) -> Result<VintageForecast, VintageError> {
        let started = Instant::now();
        let loaded = load_vintage(path, &self.settings.load).map_err(|source| VintageError::Load {
            vintage: vintage_id.to_string(),
            source,
        })?;
        let frames = prepare_frames(&loaded.table).map_err(|source| VintageError::Schema {
            vintage: vintage_id.to_string(),
            source,
        })?;
        debug!(
            vintage = vintage_id,
            cutoff = frames.cutoff,
            past_known = ?frames.past_known,
            future_known = ?frames.future_known,
            "covariates classified"
        );

        let mut predictions = self.predict(vintage_id, &frames)?;
        predictions.shift_days(TIMESTAMP_SHIFT_DAYS);

        let mut results = BTreeMap::new();
        results.insert(vintage_id.to_string(), predictions.first_row_values());

        let elapsed = started.elapsed();
        info!(
            vintage = vintage_id,
            forecasts = ?predictions.first_row_values(),
            elapsed_secs = elapsed.as_secs_f64(),
            "vintage forecast complete"
        );

        Ok(VintageForecast {
            vintage_id: vintage_id.to_string(),
            fingerprint: loaded.fingerprint,
            predictions,
            results,
            past_known: frames.past_known,
            future_known: frames.future_known,
            elapsed,
        })
    }

    fn predict(
        &self,
        vintage_id: &str,
        frames: &PreparedFrames,
    ) -> Result<PredictionTable, VintageError> {
        let oracle_err = |source: OracleError| VintageError::Oracle {
            vintage: vintage_id.to_string(),
            source,
        };
        let models = self
            .registry
            .create_all(&self.settings.model_names, &self.settings.model_settings)
            .map_err(|source| VintageError::Factory {
                vintage: vintage_id.to_string(),
                source,
            })?;
        let spec = OracleSpec {
            horizon: HORIZON,
            frequency: self.settings.frequency,
            hist_exog: frames.past_known.clone(),
            futr_exog: frames.future_known.clone(),
            search: self.settings.search.clone(),
            num_samples: self.settings.num_samples,
            val_size: validation_size(&frames.training, self.settings.val_fraction),
        };

        let mut oracle = ForecastOracle::new(models, spec).map_err(oracle_err)?;
        oracle.fit(&frames.training).map_err(oracle_err)?;
        oracle.predict(&frames.future).map_err(oracle_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nowcast_core::frame::{Column, Frame};

    fn quarter(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Months::new(3 * i as u32)
    }

    /// Six quarterly rows, target missing in the last row.
    fn table(covariates: Vec<Column>) -> VintageTable {
        let mut y: Vec<Option<f64>> = (0..6).map(|i| Some(100.0 + i as f64)).collect();
        y[5] = None;
        VintageTable {
            unique_id: "1".into(),
            ds: (0..6).map(quarter).collect(),
            y,
            covariates: Frame::from_columns(6, covariates).unwrap(),
        }
    }

    fn with_missing(name: &str, missing: &[usize]) -> Column {
        Column::new(
            name,
            (0..6)
                .map(|i| if missing.contains(&i) { None } else { Some(i as f64) })
                .collect(),
        )
    }

    #[test]
    fn covariate_missing_only_in_last_row_is_future_known() {
        let frames = prepare_frames(&table(vec![with_missing("x", &[5])])).unwrap();
        assert_eq!(frames.cutoff, 4);
        assert_eq!(frames.future_known, vec!["x"]);
        assert!(frames.past_known.is_empty());

        assert_eq!(frames.training.rows(), 5);
        assert_eq!(frames.training.ds, (0..5).map(quarter).collect::<Vec<_>>());
        assert_eq!(frames.future.rows(), 1);
        assert_eq!(frames.future.ds, vec![quarter(5)]);
        // Imputed from the last observation.
        assert_eq!(frames.future.exog.column("x").unwrap().values, vec![Some(4.0)]);
    }

    #[test]
    fn covariate_missing_before_cutoff_is_past_known() {
        let frames = prepare_frames(&table(vec![with_missing("x", &[3, 4])])).unwrap();
        assert_eq!(frames.past_known, vec!["x"]);
        assert!(frames.future_known.is_empty());
        assert_eq!(frames.future.exog.width(), 0);
        // Past-known covariates still feed the training frame, imputed.
        let train_x = &frames.training.exog.column("x").unwrap().values;
        assert_eq!(train_x, &vec![Some(0.0), Some(1.0), Some(2.0), Some(5.0), Some(5.0)]);
    }

    #[test]
    fn training_frame_orders_future_then_past() {
        let frames = prepare_frames(&table(vec![
            with_missing("p", &[4]),
            with_missing("f", &[]),
        ]))
        .unwrap();
        assert_eq!(frames.training.exog.column_names(), vec!["f", "p"]);
        assert_eq!(frames.future.exog.column_names(), vec!["f"]);
    }

    #[test]
    fn missing_training_target_is_schema_error() {
        let mut t = table(vec![]);
        t.y[2] = None;
        assert_eq!(
            prepare_frames(&t).unwrap_err(),
            SchemaError::MissingTarget { row: 2 }
        );
    }

    #[test]
    fn single_row_vintage_is_rejected() {
        let t = VintageTable {
            unique_id: "1".into(),
            ds: vec![quarter(0)],
            y: vec![Some(1.0)],
            covariates: Frame::empty(1),
        };
        assert_eq!(
            prepare_frames(&t).unwrap_err(),
            SchemaError::TooFewRows { rows: 1 }
        );
    }

    #[test]
    fn validation_size_floors_fraction_of_timestamps() {
        let frames = prepare_frames(&table(vec![])).unwrap();
        assert_eq!(validation_size(&frames.training, 0.2), 1);
        assert_eq!(validation_size(&frames.training, 0.0), 0);
    }

    #[test]
    fn errors_carry_vintage_and_kind() {
        let registry = ModelRegistry::with_builtins();
        let settings = ForecastSettings::from_config(&NowcastConfig::default());
        let runner = VintageForecastRunner::new(&registry, settings);
        let err = runner
            .forecast_path("vintage_1999_01", Path::new("/no/such/vintage_1999_01.csv"))
            .unwrap_err();
        assert_eq!(err.vintage(), "vintage_1999_01");
        assert_eq!(err.kind(), FailureKind::Io);
        assert!(err.to_string().contains("vintage_1999_01"));
    }
}
