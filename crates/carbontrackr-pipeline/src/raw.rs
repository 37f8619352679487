//! ADEME "bilans GES" open-data export.
//!
//! Headers are French free text and are matched verbatim. Emission columns are
//! recognised by the `Emissions publication P<code>` prefix; every column we do
//! not interpret is kept as passthrough text so the enriched table can be
//! written back with all source columns.

use crate::error::{PipelineError, Result};
use crate::month::parse_publication_date;
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

/// Raw export column names.
pub mod col {
    pub const ID: &str = "Id";
    pub const SIREN: &str = "SIREN principal";
    pub const METHODE_BEGES: &str = "Méthode BEGES (V4,V5)";
    pub const TYPE_STRUCTURE: &str = "Type de structure";
    pub const TYPE_COLLECTIVITE: &str = "Type de collectivité";
    pub const MODE_CONSOLIDATION: &str = "Mode de consolidation";
    pub const RECALCUL: &str = "Recalcul";
    pub const COMPARAISON: &str = "Comparaison avec le précédent bilan";
    pub const ANNEE_REPORTING: &str = "Année de reporting";
    pub const DATE_PUBLICATION: &str = "Date de publication";
    pub const NB_SALARIES: &str = "Nombre de salariés/d'agents";
    pub const APE_NAF: &str = "APE(NAF) associé";

    pub const EMISSIONS_PREFIX: &str = "Emissions publication P";

    pub const TYPED: [&str; 12] = [
        ID,
        SIREN,
        METHODE_BEGES,
        TYPE_STRUCTURE,
        TYPE_COLLECTIVITE,
        MODE_CONSOLIDATION,
        RECALCUL,
        COMPARAISON,
        ANNEE_REPORTING,
        DATE_PUBLICATION,
        NB_SALARIES,
        APE_NAF,
    ];
}

/// Column layout shared by the raw and enriched tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    /// Emission poste codes (`1.1`, ...), in source column order.
    pub poste_codes: Vec<String>,
    /// Source columns carried through untouched.
    pub passthrough_headers: Vec<String>,
}

impl TableLayout {
    pub fn emission_header(code: &str) -> String {
        format!("{}{code}", col::EMISSIONS_PREFIX)
    }
}

/// One submitted report.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDisclosure {
    pub id: u64,
    pub siren: String,
    pub methode_beges: Option<String>,
    pub type_structure: Option<String>,
    pub type_collectivite: Option<String>,
    pub mode_consolidation: Option<String>,
    pub recalcul: Option<String>,
    pub comparaison_precedent: Option<String>,
    pub annee_reporting: Option<i32>,
    pub date_publication: Option<NaiveDate>,
    pub nb_salaries: Option<String>,
    pub ape_naf: Option<String>,
    /// Aligned with `TableLayout::poste_codes`.
    pub emissions: Vec<Option<f64>>,
    /// Aligned with `TableLayout::passthrough_headers`.
    pub passthrough: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub layout: TableLayout,
    pub records: Vec<RawDisclosure>,
}

impl RawTable {
    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let table = Self::from_reader(file, delimiter, path)?;
        tracing::info!(
            path = %path.display(),
            rows = table.records.len(),
            postes = table.layout.poste_codes.len(),
            "loaded raw export"
        );
        Ok(table)
    }

    /// Parse an export from any reader; `origin` is only used in errors.
    pub fn from_reader<R: Read>(input: R, delimiter: u8, origin: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(input);
        let headers = reader
            .headers()
            .map_err(|e| PipelineError::csv(origin, e))?
            .clone();
        let columns = ColumnIndex::resolve(&headers, origin)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| PipelineError::csv(origin, e))?;
            records.push(columns.parse(&row, origin)?);
        }

        Ok(Self {
            layout: columns.layout,
            records,
        })
    }
}

struct ColumnIndex {
    typed: [usize; 12],
    emissions: Vec<usize>,
    passthrough: Vec<usize>,
    layout: TableLayout,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, origin: &Path) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut typed = [0usize; 12];
        for (slot, name) in typed.iter_mut().zip(col::TYPED) {
            *slot = position(name).ok_or_else(|| PipelineError::MissingColumn {
                path: origin.to_path_buf(),
                column: name.to_string(),
            })?;
        }

        let mut layout = TableLayout::default();
        let mut emissions = Vec::new();
        let mut passthrough = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            let header = header.trim();
            if typed.contains(&i) {
                continue;
            }
            match header.strip_prefix(col::EMISSIONS_PREFIX) {
                Some(code) => {
                    layout.poste_codes.push(code.to_string());
                    emissions.push(i);
                }
                None => {
                    layout.passthrough_headers.push(header.to_string());
                    passthrough.push(i);
                }
            }
        }

        Ok(Self {
            typed,
            emissions,
            passthrough,
            layout,
        })
    }

    fn parse(&self, row: &csv::StringRecord, origin: &Path) -> Result<RawDisclosure> {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let field = |slot: usize| row.get(self.typed[slot]).unwrap_or("").trim();
        let text = |slot: usize| Some(field(slot)).filter(|s| !s.is_empty()).map(str::to_string);
        let invalid = |column: &str, value: &str| PipelineError::InvalidValue {
            path: origin.to_path_buf(),
            line,
            column: column.to_string(),
            value: value.to_string(),
        };

        let id = field(0)
            .parse::<u64>()
            .map_err(|_| invalid(col::ID, field(0)))?;
        let siren = text(1).ok_or_else(|| invalid(col::SIREN, ""))?;

        let annee_reporting = match field(8) {
            "" => None,
            v => Some(parse_year(v).ok_or_else(|| invalid(col::ANNEE_REPORTING, v))?),
        };
        let date_publication = match field(9) {
            "" => None,
            v => Some(parse_publication_date(v).ok_or_else(|| invalid(col::DATE_PUBLICATION, v))?),
        };

        let mut emissions = Vec::with_capacity(self.emissions.len());
        for (&idx, code) in self.emissions.iter().zip(&self.layout.poste_codes) {
            let value = row.get(idx).unwrap_or("").trim();
            emissions.push(match value {
                "" => None,
                v => Some(
                    v.parse::<f64>()
                        .map_err(|_| invalid(&TableLayout::emission_header(code), v))?,
                ),
            });
        }

        let passthrough = self
            .passthrough
            .iter()
            .map(|&idx| row.get(idx).unwrap_or("").to_string())
            .collect();

        Ok(RawDisclosure {
            id,
            siren,
            methode_beges: text(2),
            type_structure: text(3),
            type_collectivite: text(4),
            mode_consolidation: text(5),
            recalcul: text(6),
            comparaison_precedent: text(7),
            annee_reporting,
            date_publication,
            nb_salaries: text(10),
            ape_naf: text(11),
            emissions,
            passthrough,
        })
    }
}

// Years sometimes come through as floats (`2021.0`) after a spreadsheet round trip.
fn parse_year(text: &str) -> Option<i32> {
    text.parse::<i32>()
        .ok()
        .or_else(|| text.strip_suffix(".0").and_then(|t| t.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Id;Type de structure;Type de collectivité;SIREN principal;APE(NAF) associé;\
Nombre de salariés/d'agents;Méthode BEGES (V4,V5);Mode de consolidation;Année de reporting;\
Date de publication;Recalcul;Comparaison avec le précédent bilan;Raison sociale;\
Emissions publication P1.1;Emissions publication P2.1";

    fn parse(body: &str) -> Result<RawTable> {
        let text = format!("{HEADER}\n{body}");
        RawTable::from_reader(text.as_bytes(), b';', Path::new("export.csv"))
    }

    #[test]
    fn parses_typed_emission_and_passthrough_columns() {
        let table = parse(
            "7;Entreprise;;001234567;7112B;Entre 50 et 249;V5;Opérationnel;2021;15/03/2022;Non;Non;Acme;12.5;\n",
        )
        .unwrap();
        assert_eq!(table.layout.poste_codes, vec!["1.1", "2.1"]);
        assert_eq!(table.layout.passthrough_headers, vec!["Raison sociale"]);

        let r = &table.records[0];
        assert_eq!(r.id, 7);
        assert_eq!(r.siren, "001234567");
        assert_eq!(r.type_collectivite, None);
        assert_eq!(r.annee_reporting, Some(2021));
        assert_eq!(r.date_publication, NaiveDate::from_ymd_opt(2022, 3, 15));
        assert_eq!(r.emissions, vec![Some(12.5), None]);
        assert_eq!(r.passthrough, vec!["Acme".to_string()]);
    }

    #[test]
    fn missing_column_is_fatal() {
        let text = "Id;SIREN principal\n1;2\n";
        let err = RawTable::from_reader(text.as_bytes(), b';', Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn invalid_emission_is_fatal() {
        let err = parse(
            "7;Entreprise;;001234567;;;V5;Opérationnel;2021;15/03/2022;Non;Non;Acme;n/a;\n",
        )
        .unwrap_err();
        match err {
            PipelineError::InvalidValue { column, value, line, .. } => {
                assert_eq!(column, "Emissions publication P1.1");
                assert_eq!(value, "n/a");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_siren_is_fatal() {
        let err = parse("7;Entreprise;;;;;V5;Opérationnel;2021;15/03/2022;Non;Non;Acme;;\n").unwrap_err();
        assert!(err.to_string().contains("SIREN principal"));
    }

    #[test]
    fn year_may_be_float_formatted() {
        assert_eq!(parse_year("2021.0"), Some(2021));
        assert_eq!(parse_year("2021"), Some(2021));
        assert_eq!(parse_year("deux mille"), None);
    }
}
