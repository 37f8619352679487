//! CarbonTrackr CLI
//!
//! Runs the data pipeline that feeds the dashboard:
//! - `build`: raw ADEME export → enriched and benchmark tables
//! - `financials`: INPI statements of the entities that publish a bilan GES
//! - `figures`: headline statistics on the benchmark table

use anyhow::{Context, Result};
use carbontrackr_bench::{aggregate_bilans, get_df, group_stats, n_bilans, n_entites, Dimension, Metric};
use carbontrackr_pipeline::PipelineConfig;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carbontrackr")]
#[command(author, version, about = "CarbonTrackr: bilans GES data pipeline")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON file overriding the default pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Root of the `raw/`, `interim/` and `processed/` trees
    #[arg(long, global = true, env = "CARBONTRACKR_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build `processed/bilans-ges-all.csv` and `processed/bilans-ges-benchmark.csv`.
    Build,

    /// Consolidate INPI financial statements into `interim/`.
    Financials {
        /// Reference date for dropping future fiscal years (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Count / mean / median of emissions per employee, per type of structure,
    /// reporting year and emission category.
    Figures {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.load()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "resolved configuration");

    match cli.command {
        Commands::Build => cmd_build(&config),
        Commands::Financials { today } => {
            cmd_financials(&config, today.unwrap_or_else(|| chrono::Local::now().date_naive()))
        }
        Commands::Figures { json } => cmd_figures(&config, json),
    }
}

fn cmd_build(config: &PipelineConfig) -> Result<()> {
    println!(
        "{} {}",
        "Building".green().bold(),
        config.raw_export_path().display()
    );

    let datasets = carbontrackr_pipeline::build_datasets(config).context("building datasets")?;
    carbontrackr_pipeline::write_datasets(config, &datasets).context("writing datasets")?;

    println!(
        "  {} {} bilans, {} entités, {} rows",
        "→".cyan(),
        n_bilans(&datasets.benchmark),
        n_entites(&datasets.benchmark),
        datasets.benchmark.len()
    );
    for path in [config.enriched_output_path(), config.benchmark_output_path()] {
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    Ok(())
}

fn cmd_financials(config: &PipelineConfig, today: NaiveDate) -> Result<()> {
    println!(
        "{} {}",
        "Consolidating".green().bold(),
        config.inpi_ratios_path().display()
    );

    let financials =
        carbontrackr_pipeline::build_financials(config, today).context("consolidating financials")?;
    carbontrackr_pipeline::write_financials(config, &financials).context("writing financials")?;

    println!(
        "  {} {} statements, {} for entities with a bilan GES",
        "→".cyan(),
        financials.all.len(),
        financials.ademe.len()
    );
    for path in [config.financials_output_path(), config.financials_ademe_output_path()] {
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    Ok(())
}

fn cmd_figures(config: &PipelineConfig, json: bool) -> Result<()> {
    let df = get_df(config).with_context(|| {
        format!(
            "loading {} (run `carbontrackr build` first)",
            config.benchmark_output_path().display()
        )
    })?;

    let metric = Metric::EmissionsParSalarie;
    let mut figures = BTreeMap::new();
    for dimension in [
        Dimension::TypeStructure,
        Dimension::AnneeReporting,
        Dimension::CategoryEmissions,
    ] {
        let bilans = aggregate_bilans(&df, dimension);
        figures.insert(dimension.name(), group_stats(&bilans, metric));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&figures)?);
        return Ok(());
    }

    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string());
    for (dimension, stats) in &figures {
        println!("{} {}", dimension.bold(), format!("({metric})").dimmed());
        for s in stats {
            println!(
                "  {:<60} {:>6} {:>10} {:>10}",
                s.group.to_string(),
                s.count,
                fmt(s.mean),
                fmt(s.median)
            );
        }
    }
    Ok(())
}
