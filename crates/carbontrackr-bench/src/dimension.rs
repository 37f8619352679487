//! Group-by dimensions and plotted metrics.

use crate::aggregate::BilanRow;
use crate::EngineError;
use carbontrackr_pipeline::BenchmarkRecord;
use carbontrackr_refdata::Scope;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A categorical axis of the benchmark table.
///
/// `PosteEmissions`, `CategoryEmissions` and `ScopeEmissions` vary inside a
/// single disclosure; the others are constant per disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    PosteEmissions,
    CategoryEmissions,
    ScopeEmissions,
    TypeStructure,
    SecteurActivite,
    AnneeReporting,
    ModeConsolidation,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::PosteEmissions,
        Dimension::CategoryEmissions,
        Dimension::ScopeEmissions,
        Dimension::TypeStructure,
        Dimension::SecteurActivite,
        Dimension::AnneeReporting,
        Dimension::ModeConsolidation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::PosteEmissions => "poste_emissions",
            Dimension::CategoryEmissions => "category_emissions",
            Dimension::ScopeEmissions => "scope_emissions",
            Dimension::TypeStructure => "type_structure",
            Dimension::SecteurActivite => "secteur_activite",
            Dimension::AnneeReporting => "annee_reporting",
            Dimension::ModeConsolidation => "mode_consolidation",
        }
    }

    /// True when the dimension varies across the rows of one disclosure.
    pub fn is_intra(self) -> bool {
        matches!(
            self,
            Dimension::PosteEmissions | Dimension::CategoryEmissions | Dimension::ScopeEmissions
        )
    }

    /// Value of the dimension on one row; `None` for missing data.
    pub fn value(self, row: &BenchmarkRecord) -> Option<GroupValue> {
        let text = |v: &Option<String>| v.clone().map(GroupValue::Text);
        match self {
            Dimension::PosteEmissions => Some(GroupValue::Text(row.sub_poste_name.clone())),
            Dimension::CategoryEmissions => Some(GroupValue::Text(row.poste_name.clone())),
            Dimension::ScopeEmissions => Some(GroupValue::Scope(row.scope)),
            Dimension::TypeStructure => text(&row.type_structure),
            Dimension::SecteurActivite => text(&row.naf1),
            Dimension::AnneeReporting => row.annee_reporting.map(GroupValue::Year),
            Dimension::ModeConsolidation => text(&row.mode_consolidation),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| EngineError::UnknownDimension(s.to_string()))
    }
}

/// Label of the group collecting rows without a value.
pub const MISSING_LABEL: &str = "Non renseigné";

/// A dimension value. Variants never compare across dimensions, so the derived
/// ordering only has to be meaningful within one variant. `Missing` stands for
/// a null value and sorts after everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupValue {
    Year(i32),
    Scope(Scope),
    Text(String),
    Missing,
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Year(year) => write!(f, "{year}"),
            GroupValue::Scope(scope) => write!(f, "{scope}"),
            GroupValue::Text(text) => f.write_str(text),
            GroupValue::Missing => f.write_str(MISSING_LABEL),
        }
    }
}

impl Serialize for GroupValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Quantity shown on the benchmark plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Emissions,
    EmissionsParSalarie,
    EmissionsClipped,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::Emissions,
        Metric::EmissionsParSalarie,
        Metric::EmissionsClipped,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Emissions => "emissions",
            Metric::EmissionsParSalarie => "emissions_par_salarie",
            Metric::EmissionsClipped => "emissions_clipped",
        }
    }

    pub fn value(self, row: &BenchmarkRecord) -> Option<f64> {
        match self {
            Metric::Emissions => row.emissions,
            Metric::EmissionsParSalarie => row.emissions_par_salarie,
            Metric::EmissionsClipped => row.emissions_clipped,
        }
    }

    pub fn of_bilan(self, row: &BilanRow) -> Option<f64> {
        match self {
            Metric::Emissions => row.emissions,
            Metric::EmissionsParSalarie => row.emissions_par_salarie,
            Metric::EmissionsClipped => row.emissions_clipped,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| EngineError::UnknownMetric(s.to_string()))
    }
}
