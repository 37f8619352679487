//! INPI financial statements ("bilans financiers"), reduced to one statement
//! per entity and fiscal year.
//!
//! Source: the "ratios financiers BCE/INPI" export from data.gouv.fr
//! (`siren;chiffre_d_affaires;resultat_net;date_cloture_exercice;type_bilan;...`).
//! Only entities that also filed a bilan GES are kept for the dashboard.

use crate::error::{PipelineError, Result};
use crate::raw::RawTable;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A row of the INPI export (unused columns are ignored).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InpiRatio {
    pub siren: String,
    pub chiffre_d_affaires: Option<f64>,
    pub resultat_net: Option<f64>,
    pub date_cloture_exercice: NaiveDate,
    pub type_bilan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub siren: String,
    pub ca: Option<f64>,
    pub resultat_net: Option<f64>,
    pub date_cloture_exercice: NaiveDate,
    pub type_bilan: String,
    pub annee_cloture_exercice: i32,
}

/// Fiscal years start in July: a closing date before July belongs to the
/// previous year.
pub fn fiscal_year(date: NaiveDate) -> i32 {
    if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// Lower is preferred: consolidated, then complete, then simplified.
pub fn type_bilan_priority(type_bilan: &str) -> u8 {
    match type_bilan {
        "K" => 1,
        "C" => 2,
        "S" => 3,
        _ => 4,
    }
}

pub fn load_inpi_ratios(path: &Path) -> Result<Vec<InpiRatio>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<InpiRatio>, _>>()
        .map_err(|e| PipelineError::csv(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded INPI ratios");
    Ok(rows)
}

/// Keep one statement per (siren, fiscal year), never in the future of `today`.
pub fn consolidate_financials(rows: Vec<InpiRatio>, today: NaiveDate) -> Vec<FinancialStatement> {
    let current = fiscal_year(today);
    let statements: Vec<FinancialStatement> = rows
        .into_iter()
        .map(|r| FinancialStatement {
            annee_cloture_exercice: fiscal_year(r.date_cloture_exercice),
            siren: r.siren,
            ca: r.chiffre_d_affaires,
            resultat_net: r.resultat_net,
            date_cloture_exercice: r.date_cloture_exercice,
            type_bilan: r.type_bilan,
        })
        .filter(|s| s.annee_cloture_exercice <= current)
        .collect();
    tracing::info!(
        remaining = statements.len(),
        "dropped fiscal years that are in the future"
    );

    // Last occurrence wins on exact duplicates.
    let mut last: HashMap<(&str, i32, &str), usize> = HashMap::new();
    for (i, s) in statements.iter().enumerate() {
        last.insert((&s.siren, s.annee_cloture_exercice, &s.type_bilan), i);
    }
    let keep: HashSet<usize> = last.into_values().collect();
    let mut statements: Vec<FinancialStatement> = statements
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, s)| s)
        .collect();
    tracing::info!(remaining = statements.len(), "dropped duplicate entries");

    statements.sort_by(|a, b| {
        a.siren
            .cmp(&b.siren)
            .then(b.annee_cloture_exercice.cmp(&a.annee_cloture_exercice))
            .then(type_bilan_priority(&a.type_bilan).cmp(&type_bilan_priority(&b.type_bilan)))
    });
    statements.dedup_by(|next, kept| {
        next.siren == kept.siren && next.annee_cloture_exercice == kept.annee_cloture_exercice
    });

    let mut by_type: HashMap<&str, usize> = HashMap::new();
    for s in &statements {
        *by_type.entry(&s.type_bilan).or_default() += 1;
    }
    tracing::info!(
        remaining = statements.len(),
        by_type = ?by_type,
        "kept one statement per entity and fiscal year, consolidated first"
    );
    statements
}

/// Restrict to entities present in the bilans GES export.
pub fn keep_sirens(rows: Vec<FinancialStatement>, sirens: &HashSet<String>) -> Vec<FinancialStatement> {
    let rows: Vec<_> = rows.into_iter().filter(|r| sirens.contains(&r.siren)).collect();
    tracing::info!(remaining = rows.len(), "kept entities with a bilan GES");
    rows
}

/// Distinct principal SIRENs of the bilans GES export.
pub fn ademe_sirens(raw: &RawTable) -> HashSet<String> {
    raw.records.iter().map(|r| r.siren.clone()).collect()
}

pub fn write_financials(path: &Path, rows: &[FinancialStatement], delimiter: u8) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| PipelineError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn read_financials(path: &Path, delimiter: u8) -> Result<Vec<FinancialStatement>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::csv(path, e))
}
