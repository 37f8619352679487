//! Reshape stage: wide enriched disclosures → long benchmark table.
//!
//! One output row per (disclosure × emission poste), for every poste column of
//! the export, whether or not the disclosure reports a value for it.

use crate::enrich::{EnrichedRecord, EnrichedTable};
use crate::error::{PipelineError, Result};
use crate::month::YearMonth;
use carbontrackr_refdata::{NafDepth, Poste, PosteCatalog, Scope};
use serde::{Deserialize, Serialize};

/// Floor applied to `emissions_clipped` so totals can be drawn on a log axis (tCO2e).
pub const EMISSIONS_FLOOR: f64 = 1e-3;

/// A row of the long benchmark table. Field names are the CSV headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "SIREN principal")]
    pub siren: String,
    #[serde(rename = "Méthode BEGES (V4,V5)")]
    pub methode_beges: Option<String>,
    #[serde(rename = "Type de structure")]
    pub type_structure: Option<String>,
    #[serde(rename = "Type de collectivité")]
    pub type_collectivite: Option<String>,
    #[serde(rename = "Mode de consolidation")]
    pub mode_consolidation: Option<String>,
    #[serde(rename = "Recalcul")]
    pub recalcul: Option<String>,
    #[serde(rename = "Comparaison avec le précédent bilan")]
    pub comparaison_precedent: Option<String>,
    pub nb_salaries_range: Option<String>,
    pub nb_salaries_min: Option<u32>,
    pub nb_salaries_max: Option<u32>,
    pub nb_salaries_mean: Option<f64>,
    pub naf5: Option<String>,
    pub naf1: Option<String>,
    pub naf2: Option<String>,
    pub naf3: Option<String>,
    pub naf4: Option<String>,
    pub month_publication: Option<YearMonth>,
    #[serde(rename = "Année de reporting")]
    pub annee_reporting: Option<i32>,
    pub poste_emissions: String,
    pub scope: Scope,
    pub poste_name: String,
    pub sub_poste_name: String,
    pub emissions: Option<f64>,
    pub emissions_par_salarie: Option<f64>,
    pub emissions_clipped: Option<f64>,
}

/// Per-employee intensity; undefined without a (positive) headcount.
pub fn emissions_per_employee(emissions: Option<f64>, mean: Option<f64>) -> Option<f64> {
    match (emissions, mean) {
        (Some(q), Some(m)) if m > 0.0 => Some(q / m),
        _ => None,
    }
}

pub fn clip_emissions(emissions: Option<f64>) -> Option<f64> {
    emissions.map(|q| q.max(EMISSIONS_FLOOR))
}

fn fact(record: &EnrichedRecord, poste: &Poste, emissions: Option<f64>) -> BenchmarkRecord {
    let raw = &record.raw;
    let label = |depth: NafDepth| record.naf_label(depth).map(str::to_string);
    BenchmarkRecord {
        id: raw.id,
        siren: raw.siren.clone(),
        methode_beges: raw.methode_beges.clone(),
        type_structure: raw.type_structure.clone(),
        type_collectivite: raw.type_collectivite.clone(),
        mode_consolidation: raw.mode_consolidation.clone(),
        recalcul: raw.recalcul.clone(),
        comparaison_precedent: raw.comparaison_precedent.clone(),
        nb_salaries_range: record.nb_salaries_range(),
        nb_salaries_min: record.employees.map(|b| b.min),
        nb_salaries_max: record.employees.and_then(|b| b.max),
        nb_salaries_mean: record.nb_salaries_mean,
        naf5: record.naf5.clone(),
        naf1: label(NafDepth::Section),
        naf2: label(NafDepth::Division),
        naf3: label(NafDepth::Group),
        naf4: label(NafDepth::Class),
        month_publication: record.month_publication,
        annee_reporting: raw.annee_reporting,
        poste_emissions: poste.code.clone(),
        scope: poste.scope,
        poste_name: poste.category_name.clone(),
        sub_poste_name: poste.sub_name.clone(),
        emissions,
        emissions_par_salarie: emissions_per_employee(emissions, record.nb_salaries_mean),
        emissions_clipped: clip_emissions(emissions),
    }
}

/// Melt the emission columns into the long benchmark table.
pub fn to_benchmark(enriched: &EnrichedTable, postes: &PosteCatalog) -> Result<Vec<BenchmarkRecord>> {
    let columns: Vec<&Poste> = enriched
        .layout
        .poste_codes
        .iter()
        .map(|code| {
            postes
                .get(code)
                .ok_or_else(|| PipelineError::UnknownPoste(code.clone()))
        })
        .collect::<Result<_>>()?;

    let mut out = Vec::with_capacity(enriched.records.len() * columns.len());
    for record in &enriched.records {
        for (poste, &emissions) in columns.iter().zip(&record.raw.emissions) {
            out.push(fact(record, poste, emissions));
        }
    }

    tracing::info!(
        disclosures = enriched.records.len(),
        postes = columns.len(),
        rows = out.len(),
        "reshaped to benchmark table"
    );
    Ok(out)
}
