//! Vintage schedule — which files are processed, in which order.

use std::path::{Path, PathBuf};

use crate::config::VintageConfig;

/// One vintage file to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vintage {
    pub year: i32,
    pub month: u32,
    /// Base file name without directory or extension, e.g. `vintage_2018_05`.
    pub id: String,
    pub path: PathBuf,
}

/// Generate the vintage list in ascending chronological order.
pub fn vintage_schedule(config: &VintageConfig, data_dir: &Path) -> Vec<Vintage> {
    let mut vintages = Vec::new();
    for year in config.start_year..=config.end_year {
        for month in 1..=12u32 {
            let leading = year == config.start_year && month < config.first_month;
            let trailing = year == config.end_year && month > config.last_month;
            if leading || trailing {
                continue;
            }
            let id = format!("{}_{year}_{month:02}", config.file_prefix);
            vintages.push(Vintage {
                year,
                month,
                path: data_dir.join(format!("{id}.csv")),
                id,
            });
        }
    }
    vintages
}

/// Base name of a path with directory and extension stripped.
pub fn vintage_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
