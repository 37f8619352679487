//! Who publishes bilans GES, and when.
//!
//! Everything here counts distinct disclosures (`Id`) and distinct entities
//! (`SIREN principal`) on a one-row-per-disclosure view.

use crate::dimension::{Dimension, GroupValue};
use crate::{EngineError, Result};
use carbontrackr_pipeline::{BenchmarkRecord, EnrichedRecord, YearMonth};
use carbontrackr_refdata::NafDepth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ============================================================================
// Per-disclosure view
// ============================================================================

/// The disclosure-level attributes of a bilan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disclosure {
    pub id: u64,
    pub siren: String,
    pub type_structure: Option<String>,
    pub mode_consolidation: Option<String>,
    pub nb_salaries_range: Option<String>,
    pub nb_salaries_min: Option<u32>,
    pub naf5: Option<String>,
    pub naf1: Option<String>,
    pub naf2: Option<String>,
    pub annee_reporting: Option<i32>,
    pub month_publication: Option<YearMonth>,
}

impl Disclosure {
    /// NAF division code, the first two digits of `naf5`.
    pub fn naf2_code(&self) -> Option<&str> {
        self.naf5.as_deref().and_then(|code| code.get(..2))
    }

    pub fn annee_publication(&self) -> Option<i32> {
        self.month_publication.map(YearMonth::year)
    }

    /// Value of a disclosure-level dimension; `None` when missing.
    pub fn value(&self, dimension: Dimension) -> Result<Option<GroupValue>> {
        let text = |v: &Option<String>| v.clone().map(GroupValue::Text);
        Ok(match dimension {
            Dimension::TypeStructure => text(&self.type_structure),
            Dimension::SecteurActivite => text(&self.naf1),
            Dimension::AnneeReporting => self.annee_reporting.map(GroupValue::Year),
            Dimension::ModeConsolidation => text(&self.mode_consolidation),
            intra => return Err(EngineError::IntraDimension(intra)),
        })
    }
}

impl From<&BenchmarkRecord> for Disclosure {
    fn from(row: &BenchmarkRecord) -> Self {
        Self {
            id: row.id,
            siren: row.siren.clone(),
            type_structure: row.type_structure.clone(),
            mode_consolidation: row.mode_consolidation.clone(),
            nb_salaries_range: row.nb_salaries_range.clone(),
            nb_salaries_min: row.nb_salaries_min,
            naf5: row.naf5.clone(),
            naf1: row.naf1.clone(),
            naf2: row.naf2.clone(),
            annee_reporting: row.annee_reporting,
            month_publication: row.month_publication,
        }
    }
}

impl From<&EnrichedRecord> for Disclosure {
    fn from(record: &EnrichedRecord) -> Self {
        let raw = &record.raw;
        Self {
            id: raw.id,
            siren: raw.siren.clone(),
            type_structure: raw.type_structure.clone(),
            mode_consolidation: raw.mode_consolidation.clone(),
            nb_salaries_range: record.nb_salaries_range(),
            nb_salaries_min: record.employees.map(|b| b.min),
            naf5: record.naf5.clone(),
            naf1: record.naf_label(NafDepth::Section).map(str::to_string),
            naf2: record.naf_label(NafDepth::Division).map(str::to_string),
            annee_reporting: raw.annee_reporting,
            month_publication: record.month_publication,
        }
    }
}

/// Collapse the long table to one row per disclosure, ordered by Id.
pub fn disclosures(df: &[BenchmarkRecord]) -> Vec<Disclosure> {
    let mut by_id: BTreeMap<u64, Disclosure> = BTreeMap::new();
    for row in df {
        by_id.entry(row.id).or_insert_with(|| Disclosure::from(row));
    }
    by_id.into_values().collect()
}

#[derive(Default)]
struct Tally<'a> {
    ids: BTreeSet<u64>,
    sirens: BTreeSet<&'a str>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, d: &'a Disclosure) {
        self.ids.insert(d.id);
        self.sirens.insert(&d.siren);
    }
}

// ============================================================================
// Counts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountRow {
    pub value: GroupValue,
    pub n_bilans: usize,
    pub n_entites: usize,
}

/// Disclosures and entities per value of `dimension`, most disclosures first.
/// Missing values are not counted.
pub fn count_by(df: &[Disclosure], dimension: Dimension) -> Result<Vec<CountRow>> {
    let mut tallies: BTreeMap<GroupValue, Tally> = BTreeMap::new();
    for d in df {
        if let Some(value) = d.value(dimension)? {
            tallies.entry(value).or_default().add(d);
        }
    }
    let mut rows: Vec<CountRow> = tallies
        .into_iter()
        .map(|(value, t)| CountRow {
            value,
            n_bilans: t.ids.len(),
            n_entites: t.sirens.len(),
        })
        .collect();
    // Stable: ties keep value order.
    rows.sort_by(|a, b| b.n_bilans.cmp(&a.n_bilans));
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeRow {
    pub nb_salaries_range: Option<String>,
    pub nb_salaries_min: Option<u32>,
    pub n_bilans: usize,
    pub n_entites: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SizeNumbers {
    pub total: usize,
    pub at_least_500: usize,
    pub less_than_500: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeBreakdown {
    pub rows: Vec<SizeRow>,
    pub numbers: SizeNumbers,
}

/// Disclosures per employee bracket, for one `type_structure` (or all when
/// `None`). Disclosures without a bracket are kept as their own row, last.
pub fn company_size_breakdown(df: &[Disclosure], type_structure: Option<&str>) -> SizeBreakdown {
    // `None` sorts first in `Option`; key on (is_none, min) to put it last.
    let mut tallies: BTreeMap<(bool, Option<u32>, Option<&str>), Tally> = BTreeMap::new();
    for d in df {
        if type_structure.is_some_and(|t| d.type_structure.as_deref() != Some(t)) {
            continue;
        }
        let key = (
            d.nb_salaries_min.is_none(),
            d.nb_salaries_min,
            d.nb_salaries_range.as_deref(),
        );
        tallies.entry(key).or_default().add(d);
    }

    let mut numbers = SizeNumbers::default();
    let rows: Vec<SizeRow> = tallies
        .into_iter()
        .map(|((_, min, range), t)| {
            let n = t.ids.len();
            match min {
                Some(m) if m >= 500 => numbers.at_least_500 += n,
                Some(_) => numbers.less_than_500 += n,
                None => numbers.unknown += n,
            }
            SizeRow {
                nb_salaries_range: range.map(str::to_string),
                nb_salaries_min: min,
                n_bilans: n,
                n_entites: t.sirens.len(),
            }
        })
        .collect();
    numbers.total = numbers.at_least_500 + numbers.less_than_500 + numbers.unknown;

    SizeBreakdown { rows, numbers }
}

/// Label of a reporting year relative to its publication year.
pub fn reporting_lag_label(lag: i32) -> String {
    match lag {
        0 => "N".to_string(),
        // A handful of bilans report on a year after their publication.
        n if n > 0 => "> N".to_string(),
        n if n <= -5 => "< N-5".to_string(),
        n => format!("N-{}", n.abs()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LagCount {
    pub annee_publication: i32,
    pub lag: String,
    pub n_bilans: usize,
}

/// Disclosures per (publication year, reporting lag), oldest first.
pub fn publication_lag_counts(df: &[Disclosure]) -> Vec<LagCount> {
    let mut tallies: BTreeMap<(i32, i32), BTreeSet<u64>> = BTreeMap::new();
    for d in df {
        if let (Some(published), Some(reported)) = (d.annee_publication(), d.annee_reporting) {
            tallies
                .entry((published, reported - published))
                .or_default()
                .insert(d.id);
        }
    }

    let mut out: Vec<LagCount> = Vec::new();
    let mut seen: BTreeMap<(i32, String), usize> = BTreeMap::new();
    for ((year, lag), ids) in tallies {
        let label = reporting_lag_label(lag);
        match seen.get(&(year, label.clone())) {
            Some(&i) => out[i].n_bilans += ids.len(),
            None => {
                seen.insert((year, label.clone()), out.len());
                out.push(LagCount {
                    annee_publication: year,
                    lag: label,
                    n_bilans: ids.len(),
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub publication: usize,
    pub reporting: usize,
}

/// Disclosures per calendar year, by publication year and by reporting year.
pub fn year_counts(df: &[Disclosure]) -> Vec<YearCount> {
    let mut years: BTreeMap<i32, (BTreeSet<u64>, BTreeSet<u64>)> = BTreeMap::new();
    for d in df {
        if let Some(year) = d.annee_publication() {
            years.entry(year).or_default().0.insert(d.id);
        }
        if let Some(year) = d.annee_reporting {
            years.entry(year).or_default().1.insert(d.id);
        }
    }
    years
        .into_iter()
        .map(|(year, (published, reported))| YearCount {
            year,
            publication: published.len(),
            reporting: reported.len(),
        })
        .collect()
}

pub const MONTH_NAMES: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: u32,
    pub name: &'static str,
    pub n_bilans: usize,
}

/// Disclosures per calendar month of publication, all years together.
pub fn publication_month_counts(df: &[Disclosure]) -> Vec<MonthCount> {
    let mut months: BTreeMap<u32, BTreeSet<u64>> = BTreeMap::new();
    for d in df {
        if let Some(month) = d.month_publication {
            months.entry(month.month()).or_default().insert(d.id);
        }
    }
    months
        .into_iter()
        .map(|(month, ids)| MonthCount {
            month,
            name: MONTH_NAMES[month as usize - 1],
            n_bilans: ids.len(),
        })
        .collect()
}

// ============================================================================
// Coverage of the regulated population
// ============================================================================

/// A row of the ADEME 2022 evaluation report, annex 1: entities subject to the
/// BEGES regulation ("obligés") per NAF division.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Obliges {
    pub naf2_code: String,
    pub n_obliges: u32,
    pub n_conformes: u32,
    /// Percent
    pub taux_conformite: f64,
}

#[derive(Debug, Deserialize)]
struct ObligesRow {
    #[serde(rename = "Code NAF")]
    code: String,
    #[serde(rename = "Nombre d'obligés")]
    n_obliges: u32,
    #[serde(rename = "Nombre conforme")]
    n_conformes: u32,
    #[serde(rename = "Taux de conformité")]
    taux: String,
}

pub const OBLIGES_DELIMITER: u8 = b',';

pub fn load_obliges(path: &Path) -> Result<Vec<Obliges>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(OBLIGES_DELIMITER)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| EngineError::csv(path, e))?;

    let mut out = Vec::new();
    for row in reader.deserialize::<ObligesRow>() {
        let row = row.map_err(|e| EngineError::csv(path, e))?;
        let taux = row
            .taux
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| EngineError::InvalidValue {
                path: path.to_path_buf(),
                column: "Taux de conformité".to_string(),
                value: row.taux.clone(),
            })?;
        out.push(Obliges {
            naf2_code: row.code,
            n_obliges: row.n_obliges,
            n_conformes: row.n_conformes,
            taux_conformite: taux,
        });
    }
    tracing::info!(path = %path.display(), divisions = out.len(), "loaded obligés annex");
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub naf1: Option<String>,
    pub naf2: Option<String>,
    pub naf2_code: String,
    pub n_bilans: usize,
    pub n_entites: usize,
    pub n_obliges: Option<u32>,
    pub taux_conformite: Option<f64>,
    /// Publishing entities per obligé
    pub ratio: Option<f64>,
}

/// Publishing entities per NAF division against the number of obligés.
/// Divisions absent from the annex have no ratio.
pub fn naf_coverage(df: &[Disclosure], obliges: &[Obliges]) -> Vec<CoverageRow> {
    let annex: BTreeMap<&str, &Obliges> = obliges.iter().map(|o| (o.naf2_code.as_str(), o)).collect();

    let mut tallies: BTreeMap<&str, (Option<&str>, Option<&str>, Tally)> = BTreeMap::new();
    for d in df {
        let Some(code) = d.naf2_code() else { continue };
        tallies
            .entry(code)
            .or_insert_with(|| (d.naf1.as_deref(), d.naf2.as_deref(), Tally::default()))
            .2
            .add(d);
    }

    tallies
        .into_iter()
        .map(|(code, (naf1, naf2, t))| {
            let known = annex.get(code);
            let n_entites = t.sirens.len();
            CoverageRow {
                naf1: naf1.map(str::to_string),
                naf2: naf2.map(str::to_string),
                naf2_code: code.to_string(),
                n_bilans: t.ids.len(),
                n_entites,
                n_obliges: known.map(|o| o.n_obliges),
                taux_conformite: known.map(|o| o.taux_conformite),
                ratio: known
                    .filter(|o| o.n_obliges > 0)
                    .map(|o| n_entites as f64 / f64::from(o.n_obliges)),
            }
        })
        .collect()
}
