//! Row filtering for the benchmark views.
//!
//! Each filterable dimension is one entry of [`FILTERS`]; [`filter_options`]
//! only iterates that table, so a new filter is a one-line change.

use crate::dimension::{Dimension, GroupValue, Metric};
use crate::{EngineError, Result};
use carbontrackr_pipeline::BenchmarkRecord;
use std::collections::BTreeMap;

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    /// Keyword used by callers (`annee_all`, `annee_options`, ...)
    pub name: &'static str,
    pub dimension: Dimension,
    /// Offer the options in sorted order
    pub sort: bool,
}

pub const FILTERS: &[FilterSpec] = &[
    FilterSpec {
        name: "type_structure",
        dimension: Dimension::TypeStructure,
        sort: false,
    },
    FilterSpec {
        name: "secteur_activite",
        dimension: Dimension::SecteurActivite,
        sort: false,
    },
    FilterSpec {
        name: "category_emissions",
        dimension: Dimension::CategoryEmissions,
        sort: false,
    },
    FilterSpec {
        name: "poste_emissions",
        dimension: Dimension::PosteEmissions,
        sort: false,
    },
    FilterSpec {
        name: "annee",
        dimension: Dimension::AnneeReporting,
        sort: true,
    },
    FilterSpec {
        name: "mode_consolidation",
        dimension: Dimension::ModeConsolidation,
        sort: false,
    },
];

pub fn filter_spec(name: &str) -> Option<&'static FilterSpec> {
    FILTERS.iter().find(|spec| spec.name == name)
}

// ============================================================================
// Request
// ============================================================================

/// Selection on one dimension. With `all` set, `options` is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub all: bool,
    pub options: Vec<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            all: true,
            options: Vec::new(),
        }
    }

    pub fn only<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            all: false,
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Missing values never match an explicit selection.
    pub fn admits(&self, value: Option<&GroupValue>) -> bool {
        if self.all {
            return true;
        }
        match value {
            Some(value) => {
                let value = value.to_string();
                self.options.iter().any(|o| *o == value)
            }
            None => false,
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

/// Sector (NAF section label) filter, applied before the registry filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Sector {
    #[default]
    All,
    Label(String),
}

impl Sector {
    /// `"all"` is the select-all sentinel used by the dashboard widgets.
    pub fn parse(text: &str) -> Self {
        if text == "all" {
            Sector::All
        } else {
            Sector::Label(text.to_string())
        }
    }
}

/// A keyword argument in the `<name>_all` / `<name>_options` convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kwarg {
    Flag(bool),
    Options(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub sector: Sector,
    pub metric: Metric,
    /// Registry name → selection; absent names select everything.
    pub selections: BTreeMap<String, Selection>,
}

impl FilterRequest {
    pub fn new(sector: Sector, metric: Metric) -> Self {
        Self {
            sector,
            metric,
            selections: BTreeMap::new(),
        }
    }

    pub fn select(mut self, name: impl Into<String>, selection: Selection) -> Self {
        self.selections.insert(name.into(), selection);
        self
    }

    /// Build a request from `<name>_all` / `<name>_options` pairs.
    ///
    /// A name given only `_options` keeps `all = true`; every key that does
    /// not belong to a registry entry is reported in one `UnknownFilter`.
    pub fn from_kwargs<I, K>(sector: Sector, metric: Metric, kwargs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Kwarg)>,
        K: Into<String>,
    {
        let mut request = Self::new(sector, metric);
        let mut leftover = Vec::new();

        for (key, value) in kwargs {
            let key = key.into();
            let parsed = key
                .strip_suffix("_all")
                .map(|name| (name, true))
                .or_else(|| key.strip_suffix("_options").map(|name| (name, false)))
                .filter(|(name, _)| filter_spec(name).is_some());
            let Some((name, is_flag)) = parsed else {
                leftover.push(key);
                continue;
            };

            let selection = request.selections.entry(name.to_string()).or_default();
            match (is_flag, value) {
                (true, Kwarg::Flag(all)) => selection.all = all,
                (false, Kwarg::Options(options)) => selection.options = options,
                (true, Kwarg::Options(_)) => {
                    return Err(EngineError::InvalidKwarg {
                        key,
                        expected: "a boolean",
                    })
                }
                (false, Kwarg::Flag(_)) => {
                    return Err(EngineError::InvalidKwarg {
                        key,
                        expected: "a list of options",
                    })
                }
            }
        }

        if !leftover.is_empty() {
            return Err(EngineError::UnknownFilter(leftover));
        }
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        let unknown: Vec<String> = self
            .selections
            .keys()
            .filter(|name| filter_spec(name).is_none())
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(EngineError::UnknownFilter(unknown))
        }
    }

    /// Whether a row passes the sector and registry filters. The metric
    /// check is separate (see [`filter_options`]).
    pub fn matches(&self, row: &BenchmarkRecord) -> bool {
        if let Sector::Label(label) = &self.sector {
            if row.naf1.as_deref() != Some(label.as_str()) {
                return false;
            }
        }
        FILTERS.iter().all(|spec| match self.selections.get(spec.name) {
            Some(selection) => selection.admits(spec.dimension.value(row).as_ref()),
            None => true,
        })
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Rows with a null or zero metric carry no information for the plots.
pub fn has_metric(row: &BenchmarkRecord, metric: Metric) -> bool {
    metric.value(row).unwrap_or(0.0) != 0.0
}

/// Apply the sector filter, every registry selection, then drop rows whose
/// metric is null or zero.
pub fn filter_options(df: &[BenchmarkRecord], request: &FilterRequest) -> Result<Vec<BenchmarkRecord>> {
    request.validate()?;
    let rows: Vec<BenchmarkRecord> = df
        .iter()
        .filter(|row| request.matches(row) && has_metric(row, request.metric))
        .cloned()
        .collect();
    tracing::debug!(
        input = df.len(),
        output = rows.len(),
        metric = %request.metric,
        "filtered benchmark rows"
    );
    Ok(rows)
}

/// Widget options for a dimension: `"all"` followed by its distinct values,
/// in order of first appearance unless `sort` is set.
pub fn dimension_options(df: &[BenchmarkRecord], dimension: Dimension, sort: bool) -> Vec<String> {
    let mut seen = ahash::AHashSet::new();
    let mut values: Vec<GroupValue> = df
        .iter()
        .filter_map(|row| dimension.value(row))
        .filter(|value| seen.insert(value.clone()))
        .collect();
    if sort {
        values.sort();
    }
    std::iter::once("all".to_string())
        .chain(values.iter().map(GroupValue::to_string))
        .collect()
}
