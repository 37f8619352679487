//! Process-wide memoization of processed tables.
//!
//! A table is read from disk at most once per canonical path and then shared
//! as `Arc<T>`. Entries are never invalidated; a failed load is not cached.

use crate::profiles::{disclosures, Disclosure};
use crate::Result;
use ahash::AHashMap;
use carbontrackr_pipeline::{io, BenchmarkRecord, PipelineConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub table: &'static str,
    pub path: PathBuf,
}

impl CacheKey {
    pub fn new(table: &'static str, path: &Path) -> Self {
        // Missing files keep their given path; loading will report them.
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self { table, path }
    }
}

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

pub struct TableCache<T> {
    slots: Mutex<AHashMap<CacheKey, Slot<T>>>,
}

impl<T> Default for TableCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(AHashMap::new()),
        }
    }
}

impl<T> TableCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `key`, loading it on first use.
    ///
    /// The map lock is only held to find the slot; concurrent callers for the
    /// same key wait on the slot, so `load` runs once per successful key.
    pub fn get_or_load<E, F>(&self, key: CacheKey, load: F) -> std::result::Result<Arc<T>, E>
    where
        F: FnOnce(&Path) -> std::result::Result<T, E>,
    {
        let slot = Arc::clone(self.slots.lock().entry(key.clone()).or_default());
        let mut guard = slot.lock();
        if let Some(table) = guard.as_ref() {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load(&key.path)?);
        tracing::debug!(table = key.table, path = %key.path.display(), "cached table");
        *guard = Some(Arc::clone(&table));
        Ok(table)
    }

    /// Number of loaded tables.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static BENCHMARK: OnceLock<TableCache<Vec<BenchmarkRecord>>> = OnceLock::new();
static DISCLOSURES: OnceLock<TableCache<Vec<Disclosure>>> = OnceLock::new();

/// The processed benchmark table, read once per process.
pub fn get_df(config: &PipelineConfig) -> Result<Arc<Vec<BenchmarkRecord>>> {
    let delimiter = config.delimiter_byte()?;
    let key = CacheKey::new("benchmark", &config.benchmark_output_path());
    let table = BENCHMARK
        .get_or_init(TableCache::new)
        .get_or_load(key, |path| io::read_benchmark(path, delimiter))?;
    Ok(table)
}

/// One row per disclosure, derived from the cached benchmark table.
pub fn get_disclosures(config: &PipelineConfig) -> Result<Arc<Vec<Disclosure>>> {
    let key = CacheKey::new("disclosures", &config.benchmark_output_path());
    DISCLOSURES
        .get_or_init(TableCache::new)
        .get_or_load(key, |_| get_df(config).map(|df| disclosures(&df)))
}
