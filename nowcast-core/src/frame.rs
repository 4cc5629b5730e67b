//! Columnar tables for a single vintage.
//!
//! Covariates are numeric columns of `Option<f64>` (missing = `None`) held
//! in a [`Frame`]. The identifier, timestamp and target travel alongside in
//! the three series-level frames:
//! - [`VintageTable`]: what the loader produces, target possibly missing
//! - [`TrainingFrame`]: what the oracle fits on, target fully observed
//! - [`FutureFrame`]: the rows being forecast, no target

use std::io::Write;
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::{SchemaError, DS, UNIQUE_ID, Y};

/// Date format used whenever a timestamp is written out.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A named numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a fully observed column.
    pub fn dense(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().copied().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }
}

/// A set of equal-length columns. Column order is significant.
///
/// A frame may have zero columns and still carry a row count, which is how
/// "no covariates" is represented.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    rows: usize,
    columns: Vec<Column>,
}

impl Frame {
    /// An empty-column frame with `rows` rows.
    pub fn empty(rows: usize) -> Self {
        Self {
            rows,
            columns: Vec::new(),
        }
    }

    /// Build a frame, checking that every column has `rows` values and that
    /// names are unique.
    pub fn from_columns(rows: usize, columns: Vec<Column>) -> Result<Self, SchemaError> {
        let mut frame = Self::empty(rows);
        for column in columns {
            frame.push(column)?;
        }
        Ok(frame)
    }

    /// Append a column.
    pub fn push(&mut self, column: Column) -> Result<(), SchemaError> {
        if column.len() != self.rows {
            return Err(SchemaError::LengthMismatch {
                column: column.name,
                expected: self.rows,
                actual: column.values.len(),
            });
        }
        if self.column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Value at (`row`, column index). `None` when missing.
    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        self.columns.get(column).and_then(|c| c.values.get(row).copied().flatten())
    }

    /// Rows in `range`, all columns.
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        let start = range.start.min(self.rows);
        let end = range.end.clamp(start, self.rows);
        Self {
            rows: end - start,
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[start..end].to_vec()))
                .collect(),
        }
    }

    /// Join by row position: `self`'s columns followed by `other`'s.
    pub fn hconcat(mut self, other: Frame) -> Result<Self, SchemaError> {
        if other.rows != self.rows {
            return Err(SchemaError::LengthMismatch {
                column: other
                    .columns
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                expected: self.rows,
                actual: other.rows,
            });
        }
        for column in other.columns {
            self.push(column)?;
        }
        Ok(self)
    }
}

/// A loaded vintage: one series plus its covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct VintageTable {
    pub unique_id: String,
    pub ds: Vec<NaiveDate>,
    pub y: Vec<Option<f64>>,
    pub covariates: Frame,
}

impl VintageTable {
    pub fn rows(&self) -> usize {
        self.ds.len()
    }

    /// Canonical column order: `unique_id, ds, y, ...covariates`.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![UNIQUE_ID.to_string(), DS.to_string(), Y.to_string()];
        names.extend(self.covariates.column_names());
        names
    }

    pub fn last_ds(&self) -> Option<NaiveDate> {
        self.ds.last().copied()
    }
}

/// Long-format training table handed to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub unique_id: String,
    pub ds: Vec<NaiveDate>,
    pub y: Vec<f64>,
    pub exog: Frame,
}

impl TrainingFrame {
    pub fn rows(&self) -> usize {
        self.ds.len()
    }

    pub fn last_ds(&self) -> Option<NaiveDate> {
        self.ds.last().copied()
    }

    /// Number of distinct timestamps.
    pub fn distinct_timestamps(&self) -> usize {
        let mut ds = self.ds.clone();
        ds.sort_unstable();
        ds.dedup();
        ds.len()
    }

    /// Write as CSV: `unique_id, ds, y, ...exog`.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![UNIQUE_ID.to_string(), DS.to_string(), Y.to_string()];
        header.extend(self.exog.column_names());
        wtr.write_record(&header)?;
        for row in 0..self.rows() {
            let mut record = vec![
                self.unique_id.clone(),
                self.ds[row].format(DATE_FORMAT).to_string(),
                self.y[row].to_string(),
            ];
            record.extend(exog_cells(&self.exog, row));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Rows being forecast: identifier, timestamp and future-known covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct FutureFrame {
    pub unique_id: String,
    pub ds: Vec<NaiveDate>,
    pub exog: Frame,
}

impl FutureFrame {
    pub fn rows(&self) -> usize {
        self.ds.len()
    }

    /// Write as CSV: `unique_id, ds, ...exog`.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![UNIQUE_ID.to_string(), DS.to_string()];
        header.extend(self.exog.column_names());
        wtr.write_record(&header)?;
        for row in 0..self.rows() {
            let mut record = vec![
                self.unique_id.clone(),
                self.ds[row].format(DATE_FORMAT).to_string(),
            ];
            record.extend(exog_cells(&self.exog, row));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn exog_cells(frame: &Frame, row: usize) -> impl Iterator<Item = String> + '_ {
    frame.columns().iter().map(move |c| match c.values[row] {
        Some(v) => v.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_columns(
            3,
            vec![
                Column::new("a", vec![Some(1.0), None, Some(3.0)]),
                Column::dense("b", &[4.0, 5.0, 6.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Frame::from_columns(2, vec![Column::dense("a", &[1.0])]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::LengthMismatch {
                column: "a".into(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Frame::from_columns(
            1,
            vec![Column::dense("a", &[1.0]), Column::dense("a", &[2.0])],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("a".into()));
    }

    #[test]
    fn slice_keeps_columns() {
        let sliced = frame().slice_rows(1..3);
        assert_eq!(sliced.rows(), 2);
        assert_eq!(sliced.column("a").unwrap().values, vec![None, Some(3.0)]);
        assert_eq!(sliced.column("b").unwrap().values, vec![Some(5.0), Some(6.0)]);
    }

    #[test]
    fn slice_clamps_to_bounds() {
        let sliced = frame().slice_rows(2..10);
        assert_eq!(sliced.rows(), 1);
    }

    #[test]
    fn hconcat_joins_by_position() {
        let right = Frame::from_columns(3, vec![Column::dense("c", &[7.0, 8.0, 9.0])]).unwrap();
        let joined = frame().hconcat(right).unwrap();
        assert_eq!(joined.column_names(), vec!["a", "b", "c"]);
        assert_eq!(joined.value(1, 2), Some(8.0));
    }

    #[test]
    fn hconcat_with_empty_frame_is_identity() {
        let joined = frame().hconcat(Frame::empty(3)).unwrap();
        assert_eq!(joined, frame());
    }

    #[test]
    fn hconcat_rejects_row_mismatch() {
        assert!(frame().hconcat(Frame::empty(2)).is_err());
    }

    #[test]
    fn training_frame_csv_layout() {
        let train = TrainingFrame {
            unique_id: "1".into(),
            ds: vec![NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()],
            y: vec![100.5],
            exog: Frame::from_columns(1, vec![Column::new("x", vec![None])]).unwrap(),
        };
        let mut buf = Vec::new();
        train.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "unique_id,ds,y,x\n1,2020-01-01,100.5,\n");
    }

    #[test]
    fn future_frame_csv_has_no_target() {
        let futr = FutureFrame {
            unique_id: "1".into(),
            ds: vec![NaiveDate::from_ymd_opt(2020, 4, 1).unwrap()],
            exog: Frame::from_columns(1, vec![Column::dense("x", &[2.0])]).unwrap(),
        };
        let mut buf = Vec::new();
        futr.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "unique_id,ds,x\n1,2020-04-01,2\n");
    }
}
