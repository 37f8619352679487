//! Publication dates and year-month periods.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year-month `{0}` (expected YYYY-MM)")]
pub struct ParseYearMonthError(String);

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError(s.to_string());
        let mut parts = s.trim().splitn(3, '-');
        let year = parts.next().and_then(|y| y.parse().ok()).ok_or_else(err)?;
        let month = parts.next().and_then(|m| m.parse().ok()).ok_or_else(err)?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a day-first publication date, with or without a time part.
pub fn parse_publication_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_first_dates() {
        let d = parse_publication_date("05/01/2023").unwrap();
        assert_eq!(YearMonth::from_date(d).to_string(), "2023-01");
        let d = parse_publication_date("20/02/2023 10:15").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2023, 2, 20));
        assert!(parse_publication_date("2023-09-28").is_some());
        assert!(parse_publication_date("28 sept. 2023").is_none());
    }

    #[test]
    fn year_month_roundtrips_through_text() {
        let ym: YearMonth = "2022-03".parse().unwrap();
        assert_eq!(ym, YearMonth::new(2022, 3).unwrap());
        assert_eq!(ym.to_string(), "2022-03");
        // Full dates are accepted and truncated.
        assert_eq!("2022-03-15".parse::<YearMonth>().unwrap(), ym);
        assert!("2022-13".parse::<YearMonth>().is_err());
        assert!("march".parse::<YearMonth>().is_err());
    }

    #[test]
    fn orders_chronologically() {
        let a = YearMonth::new(2022, 12).unwrap();
        let b = YearMonth::new(2023, 1).unwrap();
        assert!(a < b);
    }
}
