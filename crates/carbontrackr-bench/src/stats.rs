//! Summary statistics over aggregated disclosures.

use crate::aggregate::BilanRow;
use crate::dimension::{GroupValue, Metric};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub group: GroupValue,
    /// Non-null values
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Count, mean and median of `metric` per group value, ignoring nulls.
pub fn group_stats(rows: &[BilanRow], metric: Metric) -> Vec<GroupStats> {
    let mut groups: BTreeMap<&GroupValue, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let values = groups.entry(&row.group).or_default();
        if let Some(v) = metric.of_bilan(row) {
            values.push(v);
        }
    }
    groups
        .into_iter()
        .map(|(group, mut values)| {
            values.sort_by(f64::total_cmp);
            GroupStats {
                group: group.clone(),
                count: values.len(),
                mean: mean(&values),
                median: percentile(&values, 50.0),
            }
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Percentile with linear interpolation between closest ranks.
/// `sorted` must be in ascending order.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = q / 100.0 * last as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    let fraction = rank - low as f64;
    Some(sorted[low] + (sorted[high] - sorted[low]) * fraction)
}

/// Top of a Tukey box-plot whisker: the largest value within 1.5 IQR above
/// the third quartile, never below the quartile itself. `-1.0` for no data.
pub fn box_upper_whisker(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (Some(q1), Some(q3)) = (percentile(&sorted, 25.0), percentile(&sorted, 75.0)) else {
        return -1.0;
    };
    let fence = q3 + 1.5 * (q3 - q1);
    sorted
        .iter()
        .copied()
        .filter(|&v| v <= fence)
        .fold(q3, f64::max)
}
