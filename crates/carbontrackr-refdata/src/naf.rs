//! NAF rév. 2 hierarchy and labels.
//!
//! ```text
//! NIV5     NIV4   NIV3   NIV2   NIV1
//! 01.11Z   01.11  01.1   01     A
//! 01.12Z   01.12  01.1   01     A
//! ```
//!
//! Files (INSEE exports, converted to `;`-separated CSV):
//! - `naf2008_5_niveaux.csv`: `NIV5;NIV4;NIV3;NIV2;NIV1`
//! - `naf2008_liste_n{1..4}.csv`: `Code;Libellé`

use crate::{csv_reader_builder, RefDataError, Result};
use ahash::AHashMap;
use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::path::Path;

pub const HIERARCHY_FILE: &str = "naf2008_5_niveaux.csv";

/// Upper levels of the NAF nomenclature, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NafDepth {
    Section,
    Division,
    Group,
    Class,
}

impl NafDepth {
    pub const ALL: [NafDepth; 4] = [
        NafDepth::Section,
        NafDepth::Division,
        NafDepth::Group,
        NafDepth::Class,
    ];

    /// INSEE level number (`NIV1`..`NIV4`).
    pub fn level(self) -> u8 {
        self as u8 + 1
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn labels_file(self) -> String {
        format!("naf2008_liste_n{}.csv", self.level())
    }
}

impl fmt::Display for NafDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NIV{}", self.level())
    }
}

/// One resolved level of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NafLevel<'a> {
    pub code: &'a str,
    pub label: &'a str,
}

#[derive(Debug, Deserialize)]
struct HierarchyRow {
    #[serde(rename = "NIV5")]
    niv5: String,
    #[serde(rename = "NIV4")]
    niv4: String,
    #[serde(rename = "NIV3")]
    niv3: String,
    #[serde(rename = "NIV2")]
    niv2: String,
    #[serde(rename = "NIV1")]
    niv1: String,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Libellé")]
    label: String,
}

#[derive(Debug, Clone, Default)]
pub struct NafHierarchy {
    /// NIV5 → parent codes indexed by `NafDepth`.
    parents: AHashMap<String, [String; 4]>,
    /// Per depth: code → label.
    labels: [AHashMap<String, String>; 4],
}

impl NafHierarchy {
    /// Load the hierarchy and the four label tables from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let hierarchy_path = dir.join(HIERARCHY_FILE);
        let hierarchy = read_rows::<HierarchyRow>(&hierarchy_path)?;

        let mut labels: [Vec<LabelRow>; 4] = Default::default();
        for depth in NafDepth::ALL {
            labels[depth.index()] = read_rows::<LabelRow>(&dir.join(depth.labels_file()))?;
        }

        Self::from_rows(hierarchy, labels)
    }

    /// Build from in-memory CSV sources (same layout as the files).
    pub fn from_readers<R: Read>(hierarchy: R, labels: [R; 4]) -> Result<Self> {
        let hierarchy = parse_rows::<HierarchyRow, _>(hierarchy, Path::new("<hierarchy>"))?;
        let mut label_rows: [Vec<LabelRow>; 4] = Default::default();
        for (depth, reader) in NafDepth::ALL.into_iter().zip(labels) {
            label_rows[depth.index()] =
                parse_rows::<LabelRow, _>(reader, Path::new(&depth.labels_file()))?;
        }
        Self::from_rows(hierarchy, label_rows)
    }

    fn from_rows(hierarchy: Vec<HierarchyRow>, labels: [Vec<LabelRow>; 4]) -> Result<Self> {
        let mut out = NafHierarchy::default();
        for (depth, rows) in NafDepth::ALL.into_iter().zip(labels) {
            out.labels[depth.index()] = rows.into_iter().map(|r| (r.code, r.label)).collect();
        }

        for row in hierarchy {
            let parents = [row.niv1, row.niv2, row.niv3, row.niv4];
            for depth in NafDepth::ALL {
                let code = &parents[depth.index()];
                if !out.labels[depth.index()].contains_key(code) {
                    return Err(RefDataError::MissingLabel {
                        depth,
                        code: code.clone(),
                        naf5: row.niv5,
                    });
                }
            }
            out.parents.insert(row.niv5, parents);
        }
        Ok(out)
    }

    /// Number of NIV5 codes known to the hierarchy.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Resolve a dotted NIV5 code (`71.12B`) at `depth`. Unknown codes are `None`.
    pub fn resolve(&self, naf5: &str, depth: NafDepth) -> Option<NafLevel<'_>> {
        let code = &self.parents.get(naf5)?[depth.index()];
        let label = self.labels[depth.index()].get(code)?;
        Some(NafLevel { code, label })
    }

    pub fn label(&self, depth: NafDepth, code: &str) -> Option<&str> {
        self.labels[depth.index()].get(code).map(String::as_str)
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = csv_reader_builder()
        .from_path(path)
        .map_err(|e| RefDataError::csv(path, e))?;
    collect_rows(reader, path)
}

fn parse_rows<T: serde::de::DeserializeOwned, R: Read>(input: R, origin: &Path) -> Result<Vec<T>> {
    collect_rows(csv_reader_builder().from_reader(input), origin)
}

fn collect_rows<T: serde::de::DeserializeOwned, R: Read>(
    mut reader: csv::Reader<R>,
    origin: &Path,
) -> Result<Vec<T>> {
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| RefDataError::csv(origin, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIERARCHY: &str = "NIV5;NIV4;NIV3;NIV2;NIV1\n\
        01.11Z;01.11;01.1;01;A\n\
        71.12B;71.12;71.1;71;M\n";
    const N1: &str = "Code;Libellé\nA;Agriculture, sylviculture et pêche\nM;Activités spécialisées, scientifiques et techniques\n";
    const N2: &str = "Code;Libellé\n01;Culture et production animale\n71;Activités d'architecture et d'ingénierie\n";
    const N3: &str = "Code;Libellé\n01.1;Cultures non permanentes\n71.1;Activités d'architecture et d'ingénierie\n";
    const N4: &str = "Code;Libellé\n01.11;Culture de céréales\n71.12;Activités d'ingénierie\n";

    fn hierarchy() -> NafHierarchy {
        NafHierarchy::from_readers(
            HIERARCHY.as_bytes(),
            [N1.as_bytes(), N2.as_bytes(), N3.as_bytes(), N4.as_bytes()],
        )
        .unwrap()
    }

    #[test]
    fn resolves_every_depth() {
        let naf = hierarchy();
        assert_eq!(naf.len(), 2);
        let section = naf.resolve("71.12B", NafDepth::Section).unwrap();
        assert_eq!(section.code, "M");
        assert_eq!(
            section.label,
            "Activités spécialisées, scientifiques et techniques"
        );
        assert_eq!(naf.resolve("71.12B", NafDepth::Class).unwrap().code, "71.12");
        assert_eq!(naf.resolve("01.11Z", NafDepth::Group).unwrap().label, "Cultures non permanentes");
    }

    #[test]
    fn unknown_code_is_none() {
        let naf = hierarchy();
        assert!(naf.resolve("99.99Z", NafDepth::Section).is_none());
    }

    #[test]
    fn missing_label_fails_at_load() {
        let n4 = "Code;Libellé\n01.11;Culture de céréales\n";
        let err = NafHierarchy::from_readers(
            HIERARCHY.as_bytes(),
            [N1.as_bytes(), N2.as_bytes(), N3.as_bytes(), n4.as_bytes()],
        )
        .unwrap_err();
        match err {
            RefDataError::MissingLabel { depth, code, naf5 } => {
                assert_eq!(depth, NafDepth::Class);
                assert_eq!(code, "71.12");
                assert_eq!(naf5, "71.12B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn depth_file_names() {
        assert_eq!(NafDepth::Section.labels_file(), "naf2008_liste_n1.csv");
        assert_eq!(NafDepth::Class.to_string(), "NIV4");
    }
}
