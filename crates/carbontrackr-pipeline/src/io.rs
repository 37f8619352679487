//! Processed-file IO.
//!
//! - `bilans-ges-all.csv`: enriched wide table (every source column + derived)
//! - `bilans-ges-benchmark.csv`: long benchmark table

use crate::enrich::EnrichedTable;
use crate::error::{PipelineError, Result};
use crate::raw::{col, TableLayout};
use crate::reshape::BenchmarkRecord;
use carbontrackr_refdata::NafDepth;
use std::fs::File;
use std::path::Path;

/// Columns appended by the enrichment stage, in output order.
pub const DERIVED_COLUMNS: [&str; 15] = [
    "nb_salaries_range",
    "nb_salaries_min",
    "nb_salaries_max",
    "nb_salaries_mean",
    "naf5_original",
    "naf5",
    "naf1",
    "naf2",
    "naf3",
    "naf4",
    "naf1_code",
    "naf2_code",
    "naf3_code",
    "naf4_code",
    "month_publication",
];

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    File::create(path).map_err(|e| PipelineError::io(path, e))
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_enriched(path: &Path, table: &EnrichedTable, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(create(path)?);
    let err = |e| PipelineError::csv(path, e);

    let mut header: Vec<String> = col::TYPED.iter().map(|s| s.to_string()).collect();
    header.extend(table.layout.passthrough_headers.iter().cloned());
    header.extend(table.layout.poste_codes.iter().map(|c| TableLayout::emission_header(c)));
    header.extend(DERIVED_COLUMNS.iter().map(|s| s.to_string()));
    writer.write_record(&header).map_err(err)?;

    for r in &table.records {
        let raw = &r.raw;
        let mut row: Vec<String> = vec![
            raw.id.to_string(),
            raw.siren.clone(),
            opt(raw.methode_beges.as_deref()),
            opt(raw.type_structure.as_deref()),
            opt(raw.type_collectivite.as_deref()),
            opt(raw.mode_consolidation.as_deref()),
            opt(raw.recalcul.as_deref()),
            opt(raw.comparaison_precedent.as_deref()),
            opt(raw.annee_reporting),
            opt(raw.date_publication.map(|d| d.format("%d/%m/%Y"))),
            opt(raw.nb_salaries.as_deref()),
            opt(raw.ape_naf.as_deref()),
        ];
        row.extend(raw.passthrough.iter().cloned());
        row.extend(raw.emissions.iter().map(|v| opt(*v)));
        row.extend([
            opt(r.nb_salaries_range()),
            opt(r.employees.map(|b| b.min)),
            opt(r.employees.and_then(|b| b.max)),
            opt(r.nb_salaries_mean),
            opt(r.naf5_original.as_deref()),
            opt(r.naf5.as_deref()),
        ]);
        row.extend(NafDepth::ALL.map(|d| opt(r.naf_label(d))));
        row.extend(NafDepth::ALL.map(|d| opt(r.naf_code(d))));
        row.push(opt(r.month_publication));
        writer.write_record(&row).map_err(err)?;
    }

    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    tracing::info!(path = %path.display(), rows = table.records.len(), "wrote enriched table");
    Ok(())
}

pub fn write_benchmark(path: &Path, rows: &[BenchmarkRecord], delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(create(path)?);
    for row in rows {
        writer.serialize(row).map_err(|e| PipelineError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote benchmark table");
    Ok(())
}

pub fn read_benchmark(path: &Path, delimiter: u8) -> Result<Vec<BenchmarkRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<BenchmarkRecord>, _>>()
        .map_err(|e| PipelineError::csv(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded benchmark table");
    Ok(rows)
}
