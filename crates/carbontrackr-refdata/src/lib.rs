//! Reference tables for CarbonTrackr
//!
//! Static lookups used by the disclosure pipeline:
//! - NAF rév. 2 hierarchy (sous-classe → classe/groupe/division/section)
//! - NAF labels for the four upper levels
//! - ADEME emission postes (category, sub-category, scope)
//!
//! Everything here is loaded once and then only read. Lookups that can miss
//! on real data (an unknown NAF code) return `Option`; inconsistencies inside
//! the reference files themselves are load-time errors.

pub mod naf;
pub mod postes;

use std::path::{Path, PathBuf};

pub use naf::{NafDepth, NafHierarchy, NafLevel};
pub use postes::{Poste, PosteCatalog, Scope};

/// Delimiter used by every bundled/INSEE reference file.
pub const REFERENCE_DELIMITER: u8 = b';';

pub type Result<T> = std::result::Result<T, RefDataError>;

#[derive(Debug, thiserror::Error)]
pub enum RefDataError {
    #[error("{}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("NAF {depth} code `{code}` (parent of `{naf5}`) has no label")]
    MissingLabel {
        depth: NafDepth,
        code: String,
        naf5: String,
    },

    #[error("invalid emission poste code `{0}` (expected `<category>.<n>`)")]
    InvalidPosteCode(String),

    #[error("duplicate emission poste code `{0}`")]
    DuplicatePoste(String),
}

impl RefDataError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// All reference tables needed by the enrichment and reshape stages.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub naf: NafHierarchy,
    pub postes: PosteCatalog,
}

impl ReferenceData {
    /// Load the NAF tables from `naf_dir` and the poste mapping from
    /// `poste_mapping`, or from the bundled copy when `None`.
    pub fn load(naf_dir: &Path, poste_mapping: Option<&Path>) -> Result<Self> {
        let naf = NafHierarchy::load(naf_dir)?;
        let postes = match poste_mapping {
            Some(path) => PosteCatalog::load(path)?,
            None => PosteCatalog::bundled()?,
        };
        tracing::info!(
            naf5_codes = naf.len(),
            postes = postes.len(),
            "loaded reference data"
        );
        Ok(Self { naf, postes })
    }
}

pub(crate) fn csv_reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(REFERENCE_DELIMITER).trim(csv::Trim::All);
    builder
}
