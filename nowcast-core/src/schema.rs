//! Vintage schema contract — raw file columns and the canonical table layout.
//!
//! Raw vintage files carry a `year_quarter` timestamp column and a `GDPC1`
//! target column. After loading, every table is laid out as
//! `[unique_id, ds, y, ...covariates]` with covariates in file order.

use thiserror::Error;

/// Raw timestamp column in vintage files.
pub const RAW_TIMESTAMP: &str = "year_quarter";

/// Raw target column in vintage files (real GDP).
pub const RAW_TARGET: &str = "GDPC1";

/// Canonical identifier column.
pub const UNIQUE_ID: &str = "unique_id";

/// Canonical timestamp column.
pub const DS: &str = "ds";

/// Canonical target column.
pub const Y: &str = "y";

/// Columns that are never treated as covariates.
pub const RESERVED: [&str; 3] = [UNIQUE_ID, DS, Y];

/// Tokens read as a missing value. `.` is FRED's missing marker.
pub const MISSING_TOKENS: [&str; 7] = ["", "NA", "NaN", "nan", "null", "NULL", "."];

/// Returns true when a raw cell denotes a missing value.
pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

/// Structural problems with a vintage table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}, column '{column}': cannot parse number '{value}'")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("vintage has {rows} row(s); at least 2 are needed to place the cutoff")]
    TooFewRows { rows: usize },

    #[error("cutoff index {cutoff} is outside the table (row count {rows})")]
    CutoffOutOfRange { cutoff: usize, rows: usize },

    #[error("target is missing at training row {row}")]
    MissingTarget { row: usize },

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fred_missing_marker_is_missing() {
        assert!(is_missing_token("."));
        assert!(is_missing_token(" NaN "));
        assert!(is_missing_token(""));
        assert!(!is_missing_token("0"));
        assert!(!is_missing_token("1.5"));
    }

    #[test]
    fn reserved_columns_are_canonical_names() {
        assert_eq!(RESERVED, ["unique_id", "ds", "y"]);
    }
}
