//! Nowcast CLI — vintage forecasting runs and file inspection.
//!
//! Commands:
//! - `run`: forecast every scheduled vintage, checkpointing to the output dir
//! - `vintages`: list the vintage files a run would process
//! - `inspect`: load one vintage and show its covariate classification

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nowcast_core::data::{load_vintage, LoadOptions};
use nowcast_core::oracle::ModelRegistry;
use nowcast_runner::{
    format_elapsed, prepare_frames, vintage_schedule, BatchDriver, BatchError, FailurePolicy,
    ForecastSettings, NowcastConfig, VintageForecastRunner,
};

#[derive(Parser)]
#[command(
    name = "nowcast",
    about = "Nowcast CLI — GDP forecasts across data vintages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast every vintage in the configured schedule.
    Run {
        /// Path to a TOML config file. Defaults reproduce the reference run.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override `data.dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override `output.dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Stop at the first failing vintage instead of skipping it.
        #[arg(long, default_value_t = false)]
        abort_on_error: bool,
    },
    /// Print the vintage files a run would process, in order.
    Vintages {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load one vintage file and report its shape and covariate classes.
    Inspect {
        /// Vintage CSV file.
        file: PathBuf,

        /// Path to a TOML config file; its `[data]` section maps the columns.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override `data.series_id`.
        #[arg(long)]
        series_id: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("nowcast=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            output_dir,
            abort_on_error,
        } => run_batch(config.as_deref(), data_dir, output_dir, abort_on_error),
        Commands::Vintages { config } => run_vintages(config.as_deref()),
        Commands::Inspect {
            file,
            config,
            series_id,
        } => run_inspect(&file, config.as_deref(), series_id),
    }
}

fn load_config(path: Option<&Path>) -> Result<NowcastConfig> {
    match path {
        Some(path) => NowcastConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(NowcastConfig::default()),
    }
}

fn run_batch(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    abort_on_error: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = data_dir {
        config.data.dir = dir;
    }
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    if abort_on_error {
        config.on_error = FailurePolicy::Abort;
    }

    let vintages = vintage_schedule(&config.vintages, &config.data.dir);
    info!(
        vintages = vintages.len(),
        models = ?config.models.names,
        data_dir = %config.data.dir.display(),
        output_dir = %config.output.dir.display(),
        "starting run"
    );

    let registry = ModelRegistry::with_builtins();
    let runner = VintageForecastRunner::new(&registry, ForecastSettings::from_config(&config));
    let driver = BatchDriver::new(runner, config.output.clone(), config.on_error);

    match driver.run(&vintages) {
        Ok(report) => {
            println!(
                "Forecast {} of {} vintages ({} failed)",
                report.summary.succeeded(),
                report.summary.vintages_total,
                report.summary.failures.len()
            );
            for failure in &report.summary.failures {
                eprintln!("  skipped {}: {}", failure.vintage, failure.message);
            }
            println!("Summary written to: {}", report.summary_path.display());
            println!("Time taken to run the code: {}", format_elapsed(report.elapsed));
            Ok(())
        }
        Err(BatchError::Aborted { source, summary }) => {
            eprintln!("Run aborted: {source}");
            eprintln!(
                "Forecast {} vintage(s) before the failure; last checkpoint: {}",
                summary.succeeded(),
                summary
                    .checkpoints
                    .last()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn run_vintages(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let vintages = vintage_schedule(&config.vintages, &config.data.dir);
    for vintage in &vintages {
        let marker = if vintage.path.exists() { "" } else { "  (missing)" };
        println!("{}  {}{marker}", vintage.id, vintage.path.display());
    }
    println!("{} vintages", vintages.len());
    Ok(())
}

fn run_inspect(file: &Path, config_path: Option<&Path>, series_id: Option<String>) -> Result<()> {
    let opts = inspect_options(&load_config(config_path)?, series_id);
    let loaded = load_vintage(file, &opts)?;
    let table = &loaded.table;
    let frames = prepare_frames(table)
        .with_context(|| format!("cannot prepare {}", file.display()))?;

    println!("File:         {}", file.display());
    println!("Fingerprint:  {}", loaded.fingerprint);
    println!("Rows:         {}", table.rows());
    if let (Some(first), Some(last)) = (table.ds.first(), table.last_ds()) {
        println!("Range:        {first} .. {last}");
    }
    println!("Cutoff row:   {}", frames.cutoff);
    println!("Training:     {} rows", frames.training.rows());
    println!("Future-known: {} {:?}", frames.future_known.len(), frames.future_known);
    println!("Past-known:   {} {:?}", frames.past_known.len(), frames.past_known);
    Ok(())
}

/// Column mapping for `inspect`: the config's `[data]` section, with an
/// optional series id override.
fn inspect_options(config: &NowcastConfig, series_id: Option<String>) -> LoadOptions {
    let mut opts = config.data.load_options();
    if let Some(id) = series_id {
        opts.series_id = id;
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_uses_configured_columns() {
        let config = NowcastConfig::from_toml(
            "[data]\ntimestamp_column = \"date\"\ntarget_column = \"gdp\"\nseries_id = \"US\"\n",
        )
        .unwrap();
        let opts = inspect_options(&config, None);
        assert_eq!(opts.timestamp_column, "date");
        assert_eq!(opts.target_column, "gdp");
        assert_eq!(opts.series_id, "US");

        let opts = inspect_options(&config, Some("EA".into()));
        assert_eq!(opts.series_id, "EA");
        assert_eq!(opts.target_column, "gdp");
    }

    #[test]
    fn inspect_loads_custom_column_vintage() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vintage_2020_01.csv");
        std::fs::write(&file, "date,gdp,x\n2020Q1,1,1\n2020Q2,2,2\n2020Q3,,3\n").unwrap();
        let config_file = dir.path().join("nowcast.toml");
        std::fs::write(
            &config_file,
            "[data]\ntimestamp_column = \"date\"\ntarget_column = \"gdp\"\n",
        )
        .unwrap();

        run_inspect(&file, Some(config_file.as_path()), None).unwrap();
        assert!(run_inspect(&file, None, None).is_err());
    }
}
