//! Point-in-time covariate classification.
//!
//! The cutoff ("point in time") is the second-to-last row of a vintage. A
//! covariate that is observed on both the row before the cutoff and the
//! cutoff row is treated as known for the period being forecast
//! (future-known). Anything with a gap in that window can only feed the
//! model as history (past-known).
//!
//! The forecast row itself is not part of the window: a column whose only
//! gap is in the forecast row stays future-known, and the gap is imputed.
//! A rule that scans every row from `cutoff - 1` to the end would call that
//! column past-known instead; this module deliberately does not.
//!
//! A column that happens to be complete up to the cutoff is classified
//! future-known even if that completeness is accidental. That is accepted.

use tracing::debug;

use crate::frame::{Column, Frame};
use crate::schema::SchemaError;

/// Availability class of a covariate at the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Historical input only.
    PastKnown,
    /// Observed through the forecast row.
    FutureKnown,
}

/// Column-disjoint partition of the covariates. Both halves keep every row.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateSplit {
    pub past: Frame,
    pub future: Frame,
}

impl CovariateSplit {
    pub fn past_names(&self) -> Vec<String> {
        self.past.column_names()
    }

    pub fn future_names(&self) -> Vec<String> {
        self.future.column_names()
    }
}

/// Cutoff index for a table with `rows` rows: the second-to-last row.
pub fn cutoff_index(rows: usize) -> Result<usize, SchemaError> {
    if rows < 2 {
        return Err(SchemaError::TooFewRows { rows });
    }
    Ok(rows - 2)
}

/// Classify one column by the rows `cutoff - 1` and `cutoff`. The forecast
/// row after the cutoff is not inspected. A cutoff of 0 has no preceding row,
/// so the column is past-known.
pub fn classify(column: &Column, cutoff: usize) -> Availability {
    if cutoff == 0 {
        return Availability::PastKnown;
    }
    let end = (cutoff + 1).min(column.values.len());
    if column.values[cutoff - 1..end].iter().any(Option::is_none) {
        Availability::PastKnown
    } else {
        Availability::FutureKnown
    }
}

/// Partition `covariates` at `cutoff`.
///
/// `cutoff` must address an existing row.
pub fn split_covariates(covariates: &Frame, cutoff: usize) -> Result<CovariateSplit, SchemaError> {
    let rows = covariates.rows();
    if rows == 0 || cutoff > rows - 1 {
        return Err(SchemaError::CutoffOutOfRange { cutoff, rows });
    }

    let mut past = Frame::empty(rows);
    let mut future = Frame::empty(rows);
    for column in covariates.columns() {
        let class = classify(column, cutoff);
        debug!(column = %column.name, ?class, cutoff, "classified covariate");
        match class {
            Availability::PastKnown => past.push(column.clone())?,
            Availability::FutureKnown => future.push(column.clone())?,
        }
    }
    Ok(CovariateSplit { past, future })
}
