//! Nowcast Core — vintage data model, covariate availability, imputation, forecasting oracle.
//!
//! This crate contains everything that happens to a single vintage before and
//! during model fitting:
//! - Schema contract for raw vintage files and the canonical table layout
//! - CSV loading into `[unique_id, ds, y, ...covariates]`
//! - Point-in-time covariate classification (past-known vs future-known)
//! - Backward-fill + linear interpolation imputation
//! - The forecasting oracle: `Forecaster` trait, model registry, built-in
//!   baselines and the external bridge for the neural auto-models

pub mod covariates;
pub mod data;
pub mod frame;
pub mod impute;
pub mod oracle;
pub mod schema;

pub use covariates::{cutoff_index, split_covariates, Availability, CovariateSplit};
pub use data::{load_vintage, LoadError, LoadOptions, LoadedVintage};
pub use frame::{Column, Frame, FutureFrame, TrainingFrame, VintageTable};
pub use impute::impute;
pub use schema::SchemaError;
