//! Batch driver — runs the vintage schedule in order, checkpointing as it goes.
//!
//! Vintages are processed in blocks of `block_size`. After each block the
//! complete comparison table so far is written to a new checkpoint file. A
//! failing vintage is either skipped (logged, recorded in the summary) or
//! aborts the run after a final checkpoint, depending on [`FailurePolicy`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use nowcast_core::oracle::FactoryError;

use crate::config::{FailurePolicy, OutputConfig};
use crate::export::{
    write_checkpoint, write_summary, ComparisonTable, FailureRecord, RunSummary, SCHEMA_VERSION,
};
use crate::runner::{VintageError, VintageForecast, VintageForecastRunner, HORIZON};
use crate::vintage::Vintage;

/// Errors that end a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("model set rejected before the run started: {0}")]
    Preflight(#[from] FactoryError),

    #[error("run aborted at {}: {source}", source.vintage())]
    Aborted {
        #[source]
        source: VintageError,
        /// Summary of what completed before the failure.
        summary: Box<RunSummary>,
    },

    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Result of one vintage within a batch.
#[derive(Debug)]
pub enum VintageOutcome {
    Forecast(Box<VintageForecast>),
    Failed(VintageError),
}

/// Accumulated state of a run.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub table: ComparisonTable,
    pub results: BTreeMap<String, Vec<f64>>,
    pub fingerprints: BTreeMap<String, String>,
    pub failures: Vec<FailureRecord>,
    pub checkpoints: Vec<PathBuf>,
}

impl BatchState {
    pub fn new(model_names: Vec<String>) -> Self {
        Self {
            table: ComparisonTable::new(model_names),
            results: BTreeMap::new(),
            fingerprints: BTreeMap::new(),
            failures: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Fold one outcome into the state. Returns the error for failed vintages.
    fn record(&mut self, outcome: VintageOutcome) -> anyhow::Result<Option<VintageError>> {
        match outcome {
            VintageOutcome::Forecast(forecast) => {
                let forecast = *forecast;
                self.table.append(&forecast.vintage_id, &forecast.predictions)?;
                self.results.extend(forecast.results);
                self.fingerprints
                    .insert(forecast.vintage_id, forecast.fingerprint);
                Ok(None)
            }
            VintageOutcome::Failed(err) => {
                self.failures.push(FailureRecord {
                    vintage: err.vintage().to_string(),
                    kind: err.kind(),
                    message: err.to_string(),
                });
                Ok(Some(err))
            }
        }
    }

    fn summary(&self, vintages_total: usize, aborted: bool, elapsed: Duration) -> RunSummary {
        RunSummary {
            schema_version: SCHEMA_VERSION,
            model_names: self.table.model_names.clone(),
            vintages_total,
            results: self.results.clone(),
            fingerprints: self.fingerprints.clone(),
            failures: self.failures.clone(),
            checkpoints: self.checkpoints.clone(),
            aborted,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Completed run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub table: ComparisonTable,
    pub summary: RunSummary,
    pub summary_path: PathBuf,
    pub elapsed: Duration,
}

/// Drives a [`VintageForecastRunner`] over a vintage schedule.
pub struct BatchDriver<'a> {
    runner: VintageForecastRunner<'a>,
    output: OutputConfig,
    policy: FailurePolicy,
}

impl<'a> BatchDriver<'a> {
    pub fn new(runner: VintageForecastRunner<'a>, output: OutputConfig, policy: FailurePolicy) -> Self {
        Self {
            runner,
            output,
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Forecast every vintage in order.
    pub fn run(&self, vintages: &[Vintage]) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        let settings = self.runner.settings();
        self.runner
            .registry()
            .check(&settings.model_names, &settings.model_settings)?;

        let block_size = self.output.block_size.max(1);
        let blocks = vintages.len().div_ceil(block_size);
        let mut state = BatchState::new(settings.model_names.clone());

        for (b, block) in vintages.chunks(block_size).enumerate() {
            let block_number = b + 1;
            for (j, vintage) in block.iter().enumerate() {
                info!(
                    vintage = %vintage.id,
                    path = %vintage.path.display(),
                    "processing vintage ({}/{}) in block {block_number}/{blocks}",
                    j + 1,
                    block.len(),
                );
                let outcome = match self.runner.forecast(vintage) {
                    Ok(forecast) => VintageOutcome::Forecast(Box::new(forecast)),
                    Err(err) => VintageOutcome::Failed(err),
                };
                let Some(err) = state.record(outcome)? else {
                    continue;
                };
                match self.policy {
                    FailurePolicy::Skip => {
                        warn!(vintage = %vintage.id, error = %err, "skipping failed vintage");
                    }
                    FailurePolicy::Abort => {
                        error!(vintage = %vintage.id, error = %err, "aborting run");
                        let aborting = || format!("failed to persist results while aborting: {err}");
                        let path = self
                            .checkpoint(&state.table, block_number)
                            .with_context(aborting)?;
                        state.checkpoints.push(path);
                        let summary = state.summary(vintages.len(), true, started.elapsed());
                        write_summary(&summary, &self.output.dir, &self.output.prefix, HORIZON)
                            .with_context(aborting)?;
                        return Err(BatchError::Aborted {
                            source: err,
                            summary: Box::new(summary),
                        });
                    }
                }
            }
            let path = self.checkpoint(&state.table, block_number)?;
            info!(
                block = block_number,
                rows = state.table.len(),
                path = %path.display(),
                "checkpoint written"
            );
            state.checkpoints.push(path);
        }

        let elapsed = started.elapsed();
        let summary = state.summary(vintages.len(), false, elapsed);
        let summary_path = write_summary(&summary, &self.output.dir, &self.output.prefix, HORIZON)?;
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failures.len(),
            elapsed = %format_elapsed(elapsed),
            "batch complete"
        );

        Ok(BatchReport {
            table: state.table,
            summary,
            summary_path,
            elapsed,
        })
    }

    fn checkpoint(&self, table: &ComparisonTable, block: usize) -> anyhow::Result<PathBuf> {
        write_checkpoint(table, &self.output.dir, &self.output.prefix, HORIZON, block)
    }
}

/// `H hour(s), M minute(s), and S.SS seconds`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64();
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let seconds = total - hours * 3600.0 - minutes * 60.0;
    format!(
        "{} hour(s), {} minute(s), and {seconds:.2} seconds",
        hours as u64, minutes as u64
    )
}
