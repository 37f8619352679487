//! Enrichment stage: raw disclosures → enriched disclosures.
//!
//! Adds employee-count bounds, the canonical NAF code of the entity and its
//! labels at the four upper levels, and the publication month.

use crate::employees::EmployeeBracket;
use crate::month::YearMonth;
use crate::raw::{RawDisclosure, RawTable, TableLayout};
use carbontrackr_refdata::{NafDepth, NafHierarchy};
use std::collections::{BTreeSet, HashMap};

/// A NAF level resolved for one disclosure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NafClass {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub raw: RawDisclosure,
    pub employees: Option<EmployeeBracket>,
    pub nb_salaries_mean: Option<f64>,
    /// Code as reported on this disclosure (`71.12B`).
    pub naf5_original: Option<String>,
    /// Code of the entity after resolution across all its disclosures.
    pub naf5: Option<String>,
    /// Section, division, group, class, indexed like `NafDepth::ALL`.
    pub naf: [Option<NafClass>; 4],
    pub month_publication: Option<YearMonth>,
}

impl EnrichedRecord {
    pub fn naf_label(&self, depth: NafDepth) -> Option<&str> {
        self.naf[depth as usize].as_ref().map(|c| c.label.as_str())
    }

    pub fn naf_code(&self, depth: NafDepth) -> Option<&str> {
        self.naf[depth as usize].as_ref().map(|c| c.code.as_str())
    }

    pub fn nb_salaries_range(&self) -> Option<String> {
        self.employees.map(|b| b.range_label())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTable {
    pub layout: TableLayout,
    pub records: Vec<EnrichedRecord>,
}

/// `7112B` → `71.12B`. Blank input is `None`.
pub fn dotted_naf(compact: &str) -> Option<String> {
    let compact = compact.trim();
    if compact.len() < 3 || !compact.is_char_boundary(2) {
        return None;
    }
    let (division, rest) = compact.split_at(2);
    Some(format!("{division}.{rest}"))
}

/// One NAF observation for the per-entity reduction, in file order.
#[derive(Debug, Clone, Copy)]
pub struct NafObservation<'a> {
    pub siren: &'a str,
    pub naf5: Option<&'a str>,
    pub month: Option<YearMonth>,
}

/// Entity → canonical NAF code.
///
/// The code of the most recently published disclosure that carries one wins;
/// among disclosures of the same month the later row wins. Entities whose
/// disclosures never carry a code are absent from the map.
pub fn canonical_naf_by_entity<'a>(
    observations: impl IntoIterator<Item = NafObservation<'a>>,
) -> HashMap<&'a str, &'a str> {
    let mut latest: HashMap<&str, (Option<YearMonth>, usize, &str)> = HashMap::new();
    let mut distinct: HashMap<&str, BTreeSet<&str>> = HashMap::new();

    for (row, obs) in observations.into_iter().enumerate() {
        let Some(code) = obs.naf5 else { continue };
        distinct.entry(obs.siren).or_default().insert(code);
        let key = (obs.month, row);
        latest
            .entry(obs.siren)
            .and_modify(|best| {
                if key >= (best.0, best.1) {
                    *best = (obs.month, row, code);
                }
            })
            .or_insert((obs.month, row, code));
    }

    let conflicting = distinct.values().filter(|codes| codes.len() > 1).count();
    if conflicting > 0 {
        tracing::warn!(
            entities = conflicting,
            "entities reported several NAF codes; keeping the most recent one"
        );
    }
    for (siren, codes) in distinct.iter().filter(|(_, codes)| codes.len() > 1) {
        tracing::debug!(siren, codes = ?codes, chosen = latest[siren].2, "resolved NAF code");
    }

    latest
        .into_iter()
        .map(|(siren, (_, _, code))| (siren, code))
        .collect()
}

fn resolve_naf(naf: &NafHierarchy, naf5: Option<&str>) -> [Option<NafClass>; 4] {
    NafDepth::ALL.map(|depth| {
        let level = naf.resolve(naf5?, depth)?;
        Some(NafClass {
            code: level.code.to_string(),
            label: level.label.to_string(),
        })
    })
}

/// Enrich every raw disclosure.
pub fn enrich(raw: RawTable, naf: &NafHierarchy) -> EnrichedTable {
    let RawTable { layout, records } = raw;

    let naf5_original: Vec<Option<String>> = records
        .iter()
        .map(|r| r.ape_naf.as_deref().and_then(dotted_naf))
        .collect();
    let months: Vec<Option<YearMonth>> = records
        .iter()
        .map(|r| r.date_publication.map(YearMonth::from_date))
        .collect();

    let canonical: HashMap<String, String> = canonical_naf_by_entity(
        records
            .iter()
            .zip(&naf5_original)
            .zip(&months)
            .map(|((r, code), month)| NafObservation {
                siren: &r.siren,
                naf5: code.as_deref(),
                month: *month,
            }),
    )
    .into_iter()
    .map(|(siren, code)| (siren.to_string(), code.to_string()))
    .collect();

    let mut unresolved = 0usize;
    let records: Vec<EnrichedRecord> = records
        .into_iter()
        .zip(naf5_original)
        .zip(months)
        .map(|((raw, naf5_original), month_publication)| {
            let employees = raw.nb_salaries.as_deref().and_then(EmployeeBracket::parse);
            let naf5 = canonical.get(&raw.siren).cloned();
            let classes = resolve_naf(naf, naf5.as_deref());
            if naf5.is_some() && classes[0].is_none() {
                unresolved += 1;
            }
            EnrichedRecord {
                employees,
                nb_salaries_mean: employees.map(|b| b.mean()),
                naf5_original,
                naf5,
                naf: classes,
                month_publication,
                raw,
            }
        })
        .collect();

    if unresolved > 0 {
        tracing::warn!(rows = unresolved, "NAF codes missing from the hierarchy");
    }
    tracing::info!(
        rows = records.len(),
        entities = canonical.len(),
        "enriched disclosures"
    );

    EnrichedTable { layout, records }
}
