//! ADEME emission postes ("postes d'émissions").
//!
//! A poste code is `<category>.<n>` (`1.1` .. `6.1`). Categories 1 and 2 are
//! scopes 1 and 2; every other category is scope 3.

use crate::{csv_reader_builder, RefDataError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

pub const POSTE_MAPPING_FILE: &str = "mapping-poste-emissions-ademe.csv";

const BUNDLED_MAPPING: &str = include_str!("../data/mapping-poste-emissions-ademe.csv");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Scope {
    Scope1,
    Scope2,
    Scope3,
}

impl Scope {
    pub fn from_category(category: u8) -> Self {
        match category {
            1 => Scope::Scope1,
            2 => Scope::Scope2,
            _ => Scope::Scope3,
        }
    }

    /// Scope of a poste code; `None` when the category prefix is not a number.
    pub fn from_poste_code(code: &str) -> Option<Self> {
        category_of(code).map(Self::from_category)
    }

    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

impl From<Scope> for u8 {
    fn from(scope: Scope) -> u8 {
        scope.number()
    }
}

impl TryFrom<u8> for Scope {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Scope::Scope1),
            2 => Ok(Scope::Scope2),
            3 => Ok(Scope::Scope3),
            other => Err(format!("invalid scope {other}")),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope {}", self.number())
    }
}

fn category_of(code: &str) -> Option<u8> {
    let (category, rest) = code.split_once('.')?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    category.parse().ok()
}

/// A single emission sub-category with its display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poste {
    pub code: String,
    pub category: u8,
    pub scope: Scope,
    /// `"<category> - <nom_poste>"`, e.g. `"1 - Émissions directes"`.
    pub category_name: String,
    /// `"<code> - <nom_sous_poste>"`.
    pub sub_name: String,
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    code: String,
    nom_poste: String,
    nom_sous_poste: String,
}

/// Poste code → names/scope, in file order.
#[derive(Debug, Clone, Default)]
pub struct PosteCatalog {
    postes: Vec<Poste>,
    by_code: AHashMap<String, usize>,
}

impl PosteCatalog {
    /// The mapping shipped with this crate.
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_MAPPING.as_bytes(), Path::new(POSTE_MAPPING_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| RefDataError::csv(path, csv::Error::from(e)))?;
        Self::from_reader(file, path)
    }

    pub fn from_reader<R: Read>(input: R, origin: &Path) -> Result<Self> {
        let mut reader = csv_reader_builder().from_reader(input);
        let mut catalog = PosteCatalog::default();
        for row in reader.deserialize::<MappingRow>() {
            let row = row.map_err(|e| RefDataError::csv(origin, e))?;
            catalog.push(row)?;
        }
        Ok(catalog)
    }

    fn push(&mut self, row: MappingRow) -> Result<()> {
        let category =
            category_of(&row.code).ok_or_else(|| RefDataError::InvalidPosteCode(row.code.clone()))?;
        if self.by_code.contains_key(&row.code) {
            return Err(RefDataError::DuplicatePoste(row.code));
        }
        let poste = Poste {
            category,
            scope: Scope::from_category(category),
            category_name: format!("{category} - {}", row.nom_poste),
            sub_name: format!("{} - {}", row.code, row.nom_sous_poste),
            code: row.code,
        };
        self.by_code.insert(poste.code.clone(), self.postes.len());
        self.postes.push(poste);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&Poste> {
        self.by_code.get(code).map(|&i| &self.postes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poste> {
        self.postes.iter()
    }

    pub fn len(&self) -> usize {
        self.postes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postes.is_empty()
    }
}
