//! Nowcast Runner — vintage schedule, per-vintage forecasting, batch checkpoints.
//!
//! This crate builds on `nowcast-core` to provide:
//! - TOML run configuration with reference defaults
//! - The monthly vintage schedule
//! - Per-vintage pipeline: load, split, impute, fit, predict, shift
//! - Sequential batch driver with per-block checkpoints and a skip/abort policy
//! - CSV checkpoint and JSON run-summary export

pub mod batch;
pub mod config;
pub mod export;
pub mod runner;
pub mod vintage;

pub use batch::{format_elapsed, BatchDriver, BatchError, BatchReport, BatchState, VintageOutcome};
pub use config::{ConfigError, FailurePolicy, NowcastConfig};
pub use export::{ComparisonRow, ComparisonTable, FailureRecord, RunSummary};
pub use runner::{
    prepare_frames, FailureKind, ForecastSettings, PreparedFrames, VintageError, VintageForecast,
    VintageForecastRunner, HORIZON, TIMESTAMP_SHIFT_DAYS,
};
pub use vintage::{vintage_schedule, Vintage};
