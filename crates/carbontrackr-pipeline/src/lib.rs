//! CarbonTrackr data pipeline
//!
//! Turns the ADEME "bilans GES" open-data export into the two processed tables
//! the dashboard reads:
//!
//! ```text
//!  raw export ──► RawTable ──enrich──► EnrichedTable ──to_benchmark──► Vec<BenchmarkRecord>
//!                               ▲                                     (one row per poste)
//!            NAF tables ────────┘ poste mapping ───────────────────────┘
//! ```
//!
//! Also consolidates the INPI financial statements of the same entities.

pub mod config;
pub mod employees;
pub mod enrich;
pub mod error;
pub mod financials;
pub mod io;
pub mod month;
pub mod raw;
pub mod reshape;

pub use config::PipelineConfig;
pub use employees::{EmployeeBracket, OPEN_ENDED_MEAN};
pub use enrich::{canonical_naf_by_entity, enrich, EnrichedRecord, EnrichedTable, NafClass};
pub use error::{PipelineError, Result};
pub use financials::{consolidate_financials, fiscal_year, keep_sirens, FinancialStatement};
pub use month::YearMonth;
pub use raw::{RawDisclosure, RawTable, TableLayout};
pub use reshape::{to_benchmark, BenchmarkRecord, EMISSIONS_FLOOR};

use carbontrackr_refdata::ReferenceData;
use chrono::NaiveDate;

// ============================================================================
// Whole-pipeline entry points
// ============================================================================

/// Both processed tables, built in memory.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub enriched: EnrichedTable,
    pub benchmark: Vec<BenchmarkRecord>,
}

/// Load reference data and the raw export, then enrich and reshape.
pub fn build_datasets(config: &PipelineConfig) -> Result<Datasets> {
    let refdata = ReferenceData::load(
        &config.naf_dir_path(),
        config.poste_mapping_path().as_deref(),
    )?;
    let raw = RawTable::load(&config.raw_export_path(), config.delimiter_byte()?)?;
    let enriched = enrich(raw, &refdata.naf);
    let benchmark = to_benchmark(&enriched, &refdata.postes)?;
    Ok(Datasets {
        enriched,
        benchmark,
    })
}

pub fn write_datasets(config: &PipelineConfig, datasets: &Datasets) -> Result<()> {
    let delimiter = config.delimiter_byte()?;
    io::write_enriched(&config.enriched_output_path(), &datasets.enriched, delimiter)?;
    io::write_benchmark(&config.benchmark_output_path(), &datasets.benchmark, delimiter)?;
    Ok(())
}

/// Result of the financial-statement stage.
#[derive(Debug, Clone)]
pub struct Financials {
    /// One statement per entity and fiscal year.
    pub all: Vec<FinancialStatement>,
    /// Restricted to entities that filed a bilan GES.
    pub ademe: Vec<FinancialStatement>,
}

/// Consolidate the INPI export and restrict it to the entities of the raw export.
pub fn build_financials(config: &PipelineConfig, today: NaiveDate) -> Result<Financials> {
    let ratios = financials::load_inpi_ratios(&config.inpi_ratios_path())?;
    let all = consolidate_financials(ratios, today);
    let raw = RawTable::load(&config.raw_export_path(), config.delimiter_byte()?)?;
    let ademe = keep_sirens(all.clone(), &financials::ademe_sirens(&raw));
    Ok(Financials { all, ademe })
}

pub fn write_financials(config: &PipelineConfig, financials: &Financials) -> Result<()> {
    let delimiter = config.delimiter_byte()?;
    financials::write_financials(&config.financials_output_path(), &financials.all, delimiter)?;
    financials::write_financials(
        &config.financials_ademe_output_path(),
        &financials.ademe,
        delimiter,
    )?;
    Ok(())
}
