//! CarbonTrackr benchmark engine
//!
//! Filters and aggregates the long benchmark table for the dashboard:
//!
//! ```text
//! get_df ──► filter_options(request) ──► aggregate_bilans(dimension) ──► group_stats
//! ```
//!
//! Filtering never changes the per-group sums: for any request and any
//! dimension, summing `emissions` after filter → aggregate gives the same
//! totals as masking the long table directly.
//!
//! Profile statistics (who publishes, when, in which sector) work on the
//! one-row-per-disclosure view in [`profiles`].

pub mod aggregate;
pub mod cache;
pub mod dimension;
pub mod filter;
pub mod profiles;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{aggregate_bilans, n_bilans, n_entites, BilanRow};
pub use cache::{get_df, get_disclosures, CacheKey, TableCache};
pub use dimension::{Dimension, GroupValue, Metric};
pub use filter::{
    dimension_options, filter_options, FilterRequest, FilterSpec, Kwarg, Sector, Selection,
    FILTERS,
};
pub use stats::{box_upper_whisker, group_stats, GroupStats};

use carbontrackr_pipeline::PipelineError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("unknown dimension `{0}`")]
    UnknownDimension(String),

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("`{0}` varies within a disclosure")]
    IntraDimension(Dimension),

    #[error("unknown filter keys: {}", .0.join(", "))]
    UnknownFilter(Vec<String>),

    #[error("filter keyword `{key}` expects {expected}")]
    InvalidKwarg { key: String, expected: &'static str },

    #[error("{}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: invalid {column} `{value}`", .path.display())]
    InvalidValue {
        path: PathBuf,
        column: String,
        value: String,
    },
}

impl EngineError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
