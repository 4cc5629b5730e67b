//! Vintage CSV loading.
//!
//! Reads one vintage file into the canonical `[unique_id, ds, y, ...covariates]`
//! layout. The raw timestamp column is parsed into calendar dates, the raw
//! target column is renamed to `y`, and every remaining column becomes a
//! numeric covariate in file order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::timestamp::parse_period;
use crate::frame::{Column, Frame, VintageTable};
use crate::schema::{is_missing_token, SchemaError, RAW_TARGET, RAW_TIMESTAMP, RESERVED};

/// Errors from loading a vintage file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read vintage file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("schema error in {}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
}

impl LoadError {
    /// True for unreadable or corrupt files, false for schema violations.
    pub fn is_io(&self) -> bool {
        matches!(self, LoadError::Io { .. } | LoadError::Csv { .. })
    }
}

/// How raw vintage columns map onto the canonical layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Constant identifier written into `unique_id`.
    pub series_id: String,
    /// Raw column holding the period label.
    pub timestamp_column: String,
    /// Raw column holding the target series.
    pub target_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            series_id: "1".to_string(),
            timestamp_column: RAW_TIMESTAMP.to_string(),
            target_column: RAW_TARGET.to_string(),
        }
    }
}

/// A loaded vintage plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedVintage {
    pub table: VintageTable,
    /// BLAKE3 hex digest of the raw file bytes.
    pub fingerprint: String,
}

/// Load a vintage file from disk.
pub fn load_vintage(path: &Path, opts: &LoadOptions) -> Result<LoadedVintage, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fingerprint = blake3::hash(&bytes).to_hex().to_string();
    let table = parse_vintage(&bytes, path, opts)?;
    debug!(
        path = %path.display(),
        rows = table.rows(),
        covariates = table.covariates.width(),
        "loaded vintage"
    );
    Ok(LoadedVintage { table, fingerprint })
}

/// Parse vintage CSV bytes. `source` only labels errors.
pub fn parse_vintage(
    bytes: &[u8],
    source: &Path,
    opts: &LoadOptions,
) -> Result<VintageTable, LoadError> {
    let csv_err = |e: csv::Error| LoadError::Csv {
        path: source.to_path_buf(),
        source: e,
    };
    let schema_err = |e: SchemaError| LoadError::Schema {
        path: source.to_path_buf(),
        source: e,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let ts_idx = position(&opts.timestamp_column)
        .ok_or_else(|| schema_err(SchemaError::MissingColumn(opts.timestamp_column.clone())))?;
    let y_idx = position(&opts.target_column)
        .ok_or_else(|| schema_err(SchemaError::MissingColumn(opts.target_column.clone())))?;

    let covariate_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != ts_idx && i != y_idx)
        .collect();
    for &i in &covariate_idx {
        if RESERVED.contains(&headers[i].as_str()) {
            return Err(schema_err(SchemaError::DuplicateColumn(headers[i].clone())));
        }
    }

    let mut ds = Vec::new();
    let mut y = Vec::new();
    let mut covariate_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); covariate_idx.len()];

    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let date = parse_period(raw_ts).ok_or_else(|| {
            schema_err(SchemaError::BadTimestamp {
                row,
                value: raw_ts.to_string(),
            })
        })?;
        ds.push(date);

        y.push(parse_cell(record.get(y_idx), row, &headers[y_idx]).map_err(schema_err)?);
        for (slot, &i) in covariate_values.iter_mut().zip(&covariate_idx) {
            slot.push(parse_cell(record.get(i), row, &headers[i]).map_err(schema_err)?);
        }
    }

    if ds.windows(2).any(|w| w[0] >= w[1]) {
        warn!(
            path = %source.display(),
            "timestamps are not strictly increasing; rows are used in file order"
        );
    }

    let rows = ds.len();
    let columns = covariate_idx
        .iter()
        .zip(covariate_values)
        .map(|(&i, values)| Column::new(headers[i].clone(), values))
        .collect();
    let covariates = Frame::from_columns(rows, columns).map_err(schema_err)?;

    Ok(VintageTable {
        unique_id: opts.series_id.clone(),
        ds,
        y,
        covariates,
    })
}

fn parse_cell(raw: Option<&str>, row: usize, column: &str) -> Result<Option<f64>, SchemaError> {
    let raw = raw.unwrap_or_default();
    if is_missing_token(raw) {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .map_err(|_| SchemaError::BadNumber {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(text: &str) -> Result<VintageTable, LoadError> {
        parse_vintage(text.as_bytes(), Path::new("test.csv"), &LoadOptions::default())
    }

    #[test]
    fn canonical_layout() {
        let table = parse(
            "unrate,year_quarter,GDPC1,cpi\n\
             3.5,2019-01-01,100.0,250.1\n\
             3.6,2019-04-01,,.\n",
        )
        .unwrap();
        assert_eq!(table.column_names(), vec!["unique_id", "ds", "y", "unrate", "cpi"]);
        assert_eq!(table.unique_id, "1");
        assert_eq!(
            table.ds,
            vec![
                NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2019, 4, 1).unwrap()
            ]
        );
        assert_eq!(table.y, vec![Some(100.0), None]);
        assert_eq!(
            table.covariates.column("cpi").unwrap().values,
            vec![Some(250.1), None]
        );
    }

    #[test]
    fn missing_target_column_is_schema_error() {
        let err = parse("year_quarter,x\n2019Q1,1\n").unwrap_err();
        assert!(!err.is_io());
        match err {
            LoadError::Schema { source, .. } => {
                assert_eq!(source, SchemaError::MissingColumn("GDPC1".into()))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_timestamp_column_is_schema_error() {
        let err = parse("GDPC1\n1\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Schema {
                source: SchemaError::MissingColumn(_),
                ..
            }
        ));
    }

    #[test]
    fn bad_number_names_column_and_row() {
        let err = parse("year_quarter,GDPC1,x\n2019Q1,1,abc\n").unwrap_err();
        match err {
            LoadError::Schema {
                source: SchemaError::BadNumber { row, column, value },
                ..
            } => {
                assert_eq!(row, 0);
                assert_eq!(column, "x");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_timestamp_is_schema_error() {
        let err = parse("year_quarter,GDPC1\nnot-a-date,1\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Schema {
                source: SchemaError::BadTimestamp { row: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn ragged_rows_are_io_errors() {
        let err = parse("year_quarter,GDPC1\n2019Q1,1,2\n").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn reserved_covariate_name_is_rejected() {
        let err = parse("year_quarter,GDPC1,y\n2019Q1,1,2\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Schema {
                source: SchemaError::DuplicateColumn(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_vintage(
            Path::new("/definitely/not/here/vintage_2018_05.csv"),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("vintage_2018_05.csv"));
    }

    #[test]
    fn custom_series_id() {
        let opts = LoadOptions {
            series_id: "GDP".into(),
            ..LoadOptions::default()
        };
        let table = parse_vintage(b"year_quarter,GDPC1\n2019Q1,1\n", Path::new("t"), &opts).unwrap();
        assert_eq!(table.unique_id, "GDP");
        assert_eq!(table.covariates.width(), 0);
        assert_eq!(table.covariates.rows(), 1);
    }
}
