//! Pipeline configuration.
//!
//! Paths are relative to `data_dir` unless absolute. A JSON file may override
//! any subset of fields; missing fields keep their defaults.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the `raw/`, `interim/` and `processed/` trees
    pub data_dir: PathBuf,
    /// ADEME "bilans GES" open-data export
    pub raw_export: PathBuf,
    /// Directory holding the NAF hierarchy and label tables
    pub naf_dir: PathBuf,
    /// Poste mapping override (bundled mapping when unset)
    pub poste_mapping: Option<PathBuf>,
    /// ADEME 2022 report, annex 1 (obligés per NAF division)
    pub obliges_annex: PathBuf,
    /// INPI/BCE financial ratios export
    pub inpi_ratios: PathBuf,
    /// Field delimiter of the raw export and of every file we write
    pub delimiter: char,
    pub enriched_output: PathBuf,
    pub benchmark_output: PathBuf,
    pub financials_output: PathBuf,
    pub financials_ademe_output: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            raw_export: PathBuf::from("raw/heavy/export-inventaires-opendata-21-07-2024.csv"),
            naf_dir: PathBuf::from("raw"),
            poste_mapping: None,
            obliges_annex: PathBuf::from("raw/rapport-beges-ademe-2022-annexe-1.csv"),
            inpi_ratios: PathBuf::from("raw/heavy/ratios_inpi_bce.csv"),
            delimiter: ';',
            enriched_output: PathBuf::from("processed/bilans-ges-all.csv"),
            benchmark_output: PathBuf::from("processed/bilans-ges-benchmark.csv"),
            financials_output: PathBuf::from("interim/synthese_bilans_financiers.csv"),
            financials_ademe_output: PathBuf::from("interim/bilans-financiers-ademe.csv"),
        }
    }
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| PipelineError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve a configured path against `data_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn raw_export_path(&self) -> PathBuf {
        self.resolve(&self.raw_export)
    }

    pub fn naf_dir_path(&self) -> PathBuf {
        self.resolve(&self.naf_dir)
    }

    pub fn poste_mapping_path(&self) -> Option<PathBuf> {
        self.poste_mapping.as_deref().map(|p| self.resolve(p))
    }

    pub fn obliges_annex_path(&self) -> PathBuf {
        self.resolve(&self.obliges_annex)
    }

    pub fn inpi_ratios_path(&self) -> PathBuf {
        self.resolve(&self.inpi_ratios)
    }

    pub fn enriched_output_path(&self) -> PathBuf {
        self.resolve(&self.enriched_output)
    }

    pub fn benchmark_output_path(&self) -> PathBuf {
        self.resolve(&self.benchmark_output)
    }

    pub fn financials_output_path(&self) -> PathBuf {
        self.resolve(&self.financials_output)
    }

    pub fn financials_ademe_output_path(&self) -> PathBuf {
        self.resolve(&self.financials_ademe_output)
    }

    /// The delimiter as the single byte the CSV layer expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(PipelineError::Config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )))
        }
    }
}
