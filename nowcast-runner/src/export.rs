//! Persisted artifacts — the cumulative comparison CSV and the run summary.
//!
//! - **CSV**: `unique_id, ds, <model>..., vintage_file`, rewritten in full at
//!   every checkpoint to `{prefix}_h{horizon}_{block}.csv`
//! - **JSON**: run summary with a `schema_version`; newer versions are
//!   rejected on load

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use nowcast_core::frame::DATE_FORMAT;
use nowcast_core::oracle::PredictionTable;

use crate::runner::FailureKind;

/// Summary format version. Bump on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the column tagging each row with its vintage.
pub const VINTAGE_COLUMN: &str = "vintage_file";

// ─── Comparison table ───────────────────────────────────────────────

/// One forecast row tagged with the vintage it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub unique_id: String,
    pub ds: NaiveDate,
    pub values: Vec<f64>,
    pub vintage_file: String,
}

/// Cumulative forecasts across vintages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub model_names: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn new(model_names: Vec<String>) -> Self {
        Self {
            model_names,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a vintage's predictions. Model columns must match.
    pub fn append(&mut self, vintage_file: &str, predictions: &PredictionTable) -> Result<()> {
        if predictions.model_names != self.model_names {
            bail!(
                "vintage {vintage_file} produced models {:?}, table has {:?}",
                predictions.model_names,
                self.model_names
            );
        }
        self.rows
            .extend(predictions.rows.iter().map(|r| ComparisonRow {
                unique_id: r.unique_id.clone(),
                ds: r.ds,
                values: r.values.clone(),
                vintage_file: vintage_file.to_string(),
            }));
        Ok(())
    }

    /// Distinct vintage tags, in first-seen order.
    pub fn vintages(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.vintage_file.as_str()) {
                seen.push(&row.vintage_file);
            }
        }
        seen
    }
}

/// Render the table as CSV.
pub fn export_comparison_csv(table: &ComparisonTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["unique_id".to_string(), "ds".to_string()];
    header.extend(table.model_names.iter().cloned());
    header.push(VINTAGE_COLUMN.to_string());
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.unique_id.clone(), row.ds.format(DATE_FORMAT).to_string()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.push(row.vintage_file.clone());
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Parse a comparison CSV written by [`export_comparison_csv`].
pub fn import_comparison_csv(text: &str) -> Result<ComparisonTable> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if header.len() < 3
        || header[0] != "unique_id"
        || header[1] != "ds"
        || header[header.len() - 1] != VINTAGE_COLUMN
    {
        bail!("unexpected comparison header: {header:?}");
    }
    let model_names = header[2..header.len() - 1].to_vec();

    let mut table = ComparisonTable::new(model_names);
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("bad comparison row {i}"))?;
        let ds = NaiveDate::parse_from_str(&record[1], DATE_FORMAT)
            .with_context(|| format!("bad date {:?} in row {i}", &record[1]))?;
        let values = (2..record.len() - 1)
            .map(|c| {
                record[c]
                    .parse::<f64>()
                    .with_context(|| format!("bad value {:?} in row {i}", &record[c]))
            })
            .collect::<Result<Vec<f64>>>()?;
        table.rows.push(ComparisonRow {
            unique_id: record[0].to_string(),
            ds,
            values,
            vintage_file: record[record.len() - 1].to_string(),
        });
    }
    Ok(table)
}

/// `dir/{prefix}_h{horizon}_{block}.csv`
pub fn checkpoint_path(dir: &Path, prefix: &str, horizon: usize, block: usize) -> PathBuf {
    dir.join(format!("{prefix}_h{horizon}_{block}.csv"))
}

/// Write the full table to the checkpoint for `block`. Returns the path.
pub fn write_checkpoint(
    table: &ComparisonTable,
    dir: &Path,
    prefix: &str,
    horizon: usize,
    block: usize,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let path = checkpoint_path(dir, prefix, horizon, block);
    let csv = export_comparison_csv(table)?;
    std::fs::write(&path, csv)
        .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
    Ok(path)
}

// ─── Run summary ────────────────────────────────────────────────────

/// A vintage that did not produce a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub vintage: String,
    pub kind: FailureKind,
    pub message: String,
}

/// End-of-run record: forecasts, provenance, failures, timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub model_names: Vec<String>,
    pub vintages_total: usize,
    /// `vintage_id -> point forecasts`, one per model.
    pub results: BTreeMap<String, Vec<f64>>,
    /// `vintage_id -> BLAKE3 digest` of each successfully loaded file.
    pub fingerprints: BTreeMap<String, String>,
    pub failures: Vec<FailureRecord>,
    pub checkpoints: Vec<PathBuf>,
    pub aborted: bool,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }
}

pub fn export_summary_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize RunSummary to JSON")
}

/// Deserialize a summary, rejecting newer schema versions.
pub fn import_summary_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize RunSummary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

/// `dir/{prefix}_h{horizon}_summary.json`
pub fn summary_path(dir: &Path, prefix: &str, horizon: usize) -> PathBuf {
    dir.join(format!("{prefix}_h{horizon}_summary.json"))
}

pub fn write_summary(
    summary: &RunSummary,
    dir: &Path,
    prefix: &str,
    horizon: usize,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let path = summary_path(dir, prefix, horizon);
    std::fs::write(&path, export_summary_json(summary)?)
        .with_context(|| format!("failed to write summary {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowcast_core::oracle::PredictionRow;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn predictions(ds: NaiveDate, values: Vec<f64>) -> PredictionTable {
        PredictionTable {
            model_names: vec!["Naive".into(), "WindowAverage".into()],
            rows: vec![PredictionRow {
                unique_id: "1".into(),
                ds,
                values,
            }],
        }
    }

    fn sample_table() -> ComparisonTable {
        let mut table = ComparisonTable::new(vec!["Naive".into(), "WindowAverage".into()]);
        table
            .append("vintage_2018_05", &predictions(date(2018, 4, 1), vec![1.5, 2.25]))
            .unwrap();
        table
            .append("vintage_2018_06", &predictions(date(2018, 4, 1), vec![1.75, 2.0]))
            .unwrap();
        table
    }

    fn sample_summary() -> RunSummary {
        RunSummary {
            schema_version: SCHEMA_VERSION,
            model_names: vec!["Naive".into()],
            vintages_total: 2,
            results: BTreeMap::from([("vintage_2018_05".to_string(), vec![1.5])]),
            fingerprints: BTreeMap::from([("vintage_2018_05".to_string(), "ab".repeat(32))]),
            failures: vec![FailureRecord {
                vintage: "vintage_2018_06".into(),
                kind: FailureKind::Io,
                message: "missing".into(),
            }],
            checkpoints: vec![PathBuf::from("out/rnn_results_h1_1.csv")],
            aborted: false,
            elapsed_secs: 3.5,
        }
    }

    #[test]
    fn csv_has_expected_header_and_rows() {
        let csv = export_comparison_csv(&sample_table()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "unique_id,ds,Naive,WindowAverage,vintage_file");
        assert_eq!(lines[1], "1,2018-04-01,1.5,2.25,vintage_2018_05");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_import_restores_table() {
        let table = sample_table();
        let restored = import_comparison_csv(&export_comparison_csv(&table).unwrap()).unwrap();
        assert_eq!(restored, table);
        assert_eq!(restored.vintages(), vec!["vintage_2018_05", "vintage_2018_06"]);
    }

    #[test]
    fn empty_table_writes_header_only() {
        let table = ComparisonTable::new(vec!["Naive".into()]);
        let csv = export_comparison_csv(&table).unwrap();
        assert_eq!(csv.trim_end(), "unique_id,ds,Naive,vintage_file");
    }

    #[test]
    fn append_rejects_mismatched_models() {
        let mut table = ComparisonTable::new(vec!["Naive".into()]);
        let err = table
            .append("v", &predictions(date(2018, 4, 1), vec![1.0, 2.0]))
            .unwrap_err();
        assert!(err.to_string().contains("table has"));
        assert!(table.is_empty());
    }

    #[test]
    fn checkpoint_naming() {
        assert_eq!(
            checkpoint_path(Path::new("prelim_results"), "rnn_results", 1, 3),
            Path::new("prelim_results").join("rnn_results_h1_3.csv")
        );
        assert_eq!(
            summary_path(Path::new("out"), "rnn_results", 1),
            Path::new("out").join("rnn_results_h1_summary.json")
        );
    }

    #[test]
    fn write_checkpoint_creates_dir_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/out");
        let path = write_checkpoint(&sample_table(), &dir, "rnn_results", 1, 1).unwrap();
        assert!(path.exists());
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("vintage_2018_06"));
    }

    #[test]
    fn summary_json_roundtrip() {
        let summary = sample_summary();
        let json = export_summary_json(&summary).unwrap();
        let restored = import_summary_json(&json).unwrap();
        assert_eq!(restored, summary);
        assert_eq!(restored.succeeded(), 1);
        assert!(json.contains("\"kind\": \"io\""));
    }

    #[test]
    fn summary_rejects_future_schema_version() {
        let mut summary = sample_summary();
        summary.schema_version = SCHEMA_VERSION + 1;
        let json = export_summary_json(&summary).unwrap();
        let err = import_summary_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn write_summary_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_summary(&sample_summary(), tmp.path(), "rnn_results", 1).unwrap();
        let restored = import_summary_json(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(restored.vintages_total, 2);
    }
}
