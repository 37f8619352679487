//! Per-disclosure aggregation.
//!
//! The long table has one row per poste. Before plotting by a dimension the
//! rows of each disclosure are summed within each value of that dimension,
//! so every box-plot sample is one disclosure.

use crate::dimension::{Dimension, GroupValue};
use carbontrackr_pipeline::BenchmarkRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BilanRow {
    pub group: GroupValue,
    pub id: u64,
    pub siren: String,
    pub emissions: Option<f64>,
    pub emissions_par_salarie: Option<f64>,
    pub emissions_clipped: Option<f64>,
    pub nb_salaries_mean: Option<f64>,
    /// Long-table rows summed into this one
    pub n_postes: usize,
}

fn add(total: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value {
        *total = Some(total.unwrap_or(0.0) + v);
    }
}

/// Sum the metrics per (dimension value, disclosure).
///
/// For `poste_emissions` this keeps one row per input row; for the other
/// intra-disclosure dimensions it merges the postes of a category or scope;
/// for inter-disclosure dimensions it yields one row per disclosure. Rows
/// without a value for the dimension are grouped under [`GroupValue::Missing`]
/// so group sums add up to the input total. A metric that is null on every
/// merged row stays null. Output is ordered by (value, Id).
pub fn aggregate_bilans(df: &[BenchmarkRecord], group_by: Dimension) -> Vec<BilanRow> {
    let mut groups: BTreeMap<(GroupValue, u64), BilanRow> = BTreeMap::new();
    let mut missing = 0usize;

    for row in df {
        let group = group_by.value(row).unwrap_or_else(|| {
            missing += 1;
            GroupValue::Missing
        });
        let bilan = groups
            .entry((group.clone(), row.id))
            .or_insert_with(|| BilanRow {
                group,
                id: row.id,
                siren: row.siren.clone(),
                emissions: None,
                emissions_par_salarie: None,
                emissions_clipped: None,
                nb_salaries_mean: row.nb_salaries_mean,
                n_postes: 0,
            });
        add(&mut bilan.emissions, row.emissions);
        add(&mut bilan.emissions_par_salarie, row.emissions_par_salarie);
        add(&mut bilan.emissions_clipped, row.emissions_clipped);
        bilan.n_postes += 1;
    }

    if missing > 0 {
        tracing::debug!(
            dimension = %group_by,
            rows = missing,
            "rows without a value for the grouping dimension"
        );
    }
    groups.into_values().collect()
}

/// Number of distinct disclosures.
pub fn n_bilans(df: &[BenchmarkRecord]) -> usize {
    df.iter().map(|r| r.id).collect::<BTreeSet<_>>().len()
}

/// Number of distinct entities (principal SIREN).
pub fn n_entites(df: &[BenchmarkRecord]) -> usize {
    df.iter().map(|r| r.siren.as_str()).collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn inter_dimension_gives_one_row_per_disclosure() {
        let rows = vec![
            record(1, "1.1", Some(10.0), Some(2.0)),
            record(1, "2.1", Some(5.0), Some(2.0)),
            record(2, "1.1", Some(4.0), None),
        ];
        let out = aggregate_bilans(&rows, Dimension::TypeStructure);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, 1);
        assert_eq!(out[0].emissions, Some(15.0));
        assert_eq!(out[0].emissions_par_salarie, Some(7.5));
        assert_eq!(out[0].n_postes, 2);
        assert_eq!(out[1].emissions_par_salarie, None);
    }

    #[test]
    fn poste_dimension_keeps_rows() {
        let rows = vec![
            record(1, "1.1", Some(10.0), None),
            record(1, "1.2", Some(5.0), None),
            record(1, "2.1", Some(1.0), None),
        ];
        assert_eq!(aggregate_bilans(&rows, Dimension::PosteEmissions).len(), 3);
        // 1.x share a category and a scope.
        assert_eq!(aggregate_bilans(&rows, Dimension::CategoryEmissions).len(), 2);
        assert_eq!(aggregate_bilans(&rows, Dimension::ScopeEmissions).len(), 2);
    }

    #[test]
    fn rows_without_value_form_a_trailing_group() {
        let mut orphan = record(1, "1.1", Some(1.0), None);
        orphan.naf1 = None;
        let mut orphan_2 = record(1, "2.1", Some(3.0), None);
        orphan_2.naf1 = None;
        let rows = vec![orphan, record(2, "1.1", Some(2.0), None), orphan_2];

        let out = aggregate_bilans(&rows, Dimension::SecteurActivite);
        assert_eq!(out.len(), n_bilans(&rows));
        assert_eq!(out[1].group, GroupValue::Missing);
        assert_eq!((out[1].id, out[1].emissions, out[1].n_postes), (1, Some(4.0), 2));
        let total: f64 = out.iter().filter_map(|b| b.emissions).sum();
        assert_eq!(total, 6.0);
    }

    #[test]
    fn counts_distinct_ids_and_entities() {
        let mut other = record(2, "1.1", None, None);
        other.siren = "999".into();
        let rows = vec![
            record(1, "1.1", None, None),
            record(1, "1.2", None, None),
            record(3, "1.1", None, None),
            other,
        ];
        assert_eq!(n_bilans(&rows), 3);
        assert_eq!(n_entites(&rows), 2);
    }
}
