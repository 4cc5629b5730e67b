//! External process bridge for the neural auto-models.
//!
//! The recurrent auto-models (RNN, LSTM, GRU, TCN) and their hyperparameter
//! search live in an external forecasting library. Each prediction runs the
//! configured command once, exchanging files through a scratch directory:
//!
//! | file              | direction | contents                                  |
//! |-------------------|-----------|-------------------------------------------|
//! | `train.csv`       | in        | `unique_id, ds, y, ...covariates`         |
//! | `futr.csv`        | in        | `unique_id, ds, ...future-known`          |
//! | `request.json`    | in        | [`BridgeRequest`]                         |
//! | `predictions.csv` | out       | `unique_id, ds, <model>`                  |
//!
//! The scratch directory path is appended as the command's last argument.
//! The directory is removed when the call returns.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Forecaster, OracleError, OracleSpec, SearchSpace};
use crate::frame::{FutureFrame, TrainingFrame};

/// Program and leading arguments used to launch the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl BridgeCommand {
    /// Build from an argv-style list: the first element is the program.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Contents of `request.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub model: String,
    pub horizon: usize,
    pub freq: String,
    pub val_size: usize,
    pub num_samples: usize,
    pub hist_exog_list: Vec<String>,
    pub futr_exog_list: Vec<String>,
    pub config: SearchSpace,
}

/// A model hosted by the external bridge.
///
/// `fit` only records the training data; the bridge fits and predicts in a
/// single invocation during `predict`.
pub struct ExternalModel {
    model: String,
    command: BridgeCommand,
    fitted: Option<(TrainingFrame, OracleSpec)>,
}

impl ExternalModel {
    pub fn new(model: impl Into<String>, command: BridgeCommand) -> Self {
        Self {
            model: model.into(),
            command,
            fitted: None,
        }
    }

    fn request(&self, spec: &OracleSpec, horizon: usize) -> BridgeRequest {
        BridgeRequest {
            model: self.model.clone(),
            horizon,
            freq: spec.frequency.alias().to_string(),
            val_size: spec.val_size,
            num_samples: spec.num_samples,
            hist_exog_list: spec.hist_exog.clone(),
            futr_exog_list: spec.futr_exog.clone(),
            config: spec.search.clone(),
        }
    }

    fn write_inputs(
        &self,
        dir: &Path,
        train: &TrainingFrame,
        futr: &FutureFrame,
        request: &BridgeRequest,
    ) -> Result<(), OracleError> {
        let malformed = |e: csv::Error| OracleError::BridgeOutput {
            model: self.model.clone(),
            message: format!("cannot write input CSV: {e}"),
        };
        train
            .write_csv(BufWriter::new(File::create(dir.join("train.csv"))?))
            .map_err(malformed)?;
        futr.write_csv(BufWriter::new(File::create(dir.join("futr.csv"))?))
            .map_err(malformed)?;
        let json = serde_json::to_vec_pretty(request).map_err(|e| OracleError::BridgeOutput {
            model: self.model.clone(),
            message: format!("cannot encode request: {e}"),
        })?;
        std::fs::write(dir.join("request.json"), json)?;
        Ok(())
    }

    fn run(&self, dir: &Path) -> Result<(), OracleError> {
        info!(model = %self.model, program = %self.command.program, "launching bridge");
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(dir)
            .output()
            .map_err(|source| OracleError::BridgeSpawn {
                model: self.model.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(OracleError::BridgeExit {
                model: self.model.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn read_predictions(&self, dir: &Path, horizon: usize) -> Result<Vec<f64>, OracleError> {
        let path = dir.join("predictions.csv");
        let malformed = |message: String| OracleError::BridgeOutput {
            model: self.model.clone(),
            message,
        };
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| malformed(format!("cannot open {}: {e}", path.display())))?;
        let headers = rdr
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .clone();
        let idx = headers
            .iter()
            .position(|h| h == self.model)
            .ok_or_else(|| malformed(format!("no '{}' column in predictions.csv", self.model)))?;

        let mut values = Vec::with_capacity(horizon);
        for record in rdr.records() {
            let record = record.map_err(|e| malformed(e.to_string()))?;
            let raw = record.get(idx).unwrap_or_default();
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| malformed(format!("non-numeric forecast '{raw}'")))?;
            values.push(value);
        }
        if values.len() != horizon {
            return Err(malformed(format!(
                "expected {horizon} forecast row(s), got {}",
                values.len()
            )));
        }
        Ok(values)
    }
}

impl Forecaster for ExternalModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn fit(&mut self, train: &TrainingFrame, spec: &OracleSpec) -> Result<(), OracleError> {
        if train.rows() == 0 {
            return Err(OracleError::EmptyTraining);
        }
        self.fitted = Some((train.clone(), spec.clone()));
        Ok(())
    }

    fn predict(&self, futr: &FutureFrame, horizon: usize) -> Result<Vec<f64>, OracleError> {
        let (train, spec) = self.fitted.as_ref().ok_or(OracleError::NotFitted)?;
        let scratch = tempfile::Builder::new()
            .prefix("nowcast-bridge-")
            .tempdir()?;
        let request = self.request(spec, horizon);
        self.write_inputs(scratch.path(), train, futr, &request)?;
        self.run(scratch.path())?;
        let values = self.read_predictions(scratch.path(), horizon)?;
        debug!(model = %self.model, ?values, "bridge forecasts");
        Ok(values)
    }
}
