//! Employee-count brackets ("Nombre de salariés/d'agents").
//!
//! The export only gives a free-text range:
//! - `Entre 5 000 et 9 999` → 5000..=9999
//! - `Plus de 9 999`        → 9999..

/// Mean headcount assumed for open-ended brackets. A policy value, not an estimate.
pub const OPEN_ENDED_MEAN: f64 = 15_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmployeeBracket {
    pub min: u32,
    pub max: Option<u32>,
}

impl EmployeeBracket {
    /// Parse a bracket. Anything that is not one of the two known shapes is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        // Thousands are separated by (narrow) no-break spaces in some exports.
        let normalized: String = text
            .split(char::is_whitespace)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(rest) = normalized.strip_prefix("Plus de ") {
            return Some(Self {
                min: parse_count(rest)?,
                max: None,
            });
        }

        let rest = normalized.strip_prefix("Entre ")?;
        let (low, high) = rest.split_once(" et ")?;
        Some(Self {
            min: parse_count(low)?,
            max: Some(parse_count(high)?),
        })
    }

    /// `"5000-9999"`, or `"9999-"` for an open-ended bracket.
    pub fn range_label(&self) -> String {
        match self.max {
            Some(max) => format!("{}-{}", self.min, max),
            None => format!("{}-", self.min),
        }
    }

    pub fn mean(&self) -> f64 {
        match self.max {
            Some(max) => (f64::from(self.min) + f64::from(max)) / 2.0,
            None => OPEN_ENDED_MEAN,
        }
    }
}

fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
