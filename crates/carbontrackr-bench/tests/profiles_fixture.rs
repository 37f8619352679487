use approx::assert_relative_eq;
use carbontrackr_bench::profiles::{
    company_size_breakdown, count_by, load_obliges, naf_coverage, publication_lag_counts,
    publication_month_counts, year_counts, Disclosure, SizeNumbers,
};
use carbontrackr_bench::{get_df, get_disclosures, Dimension};
use carbontrackr_pipeline::{build_datasets, write_datasets, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_config() -> PipelineConfig {
    let data_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/data");
    PipelineConfig {
        raw_export: PathBuf::from("raw/heavy/export-inventaires-fixture.csv"),
        ..PipelineConfig::with_data_dir(data_dir)
    }
}

fn disclosures() -> Vec<Disclosure> {
    let datasets = build_datasets(&fixture_config()).unwrap();
    datasets.enriched.records.iter().map(Disclosure::from).collect()
}

#[test]
fn cached_tables_are_shared() {
    let dir = tempfile::tempdir().unwrap();
    let source = fixture_config();
    let datasets = build_datasets(&source).unwrap();
    let config = PipelineConfig {
        enriched_output: dir.path().join("all.csv"),
        benchmark_output: dir.path().join("benchmark.csv"),
        ..source
    };
    write_datasets(&config, &datasets).unwrap();

    let first = get_df(&config).unwrap();
    let second = get_df(&config).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 154);

    let per_disclosure = get_disclosures(&config).unwrap();
    let from_enriched: Vec<Disclosure> =
        datasets.enriched.records.iter().map(Disclosure::from).collect();
    assert_eq!(*per_disclosure, from_enriched);
}

#[test]
fn counts_per_type_structure() {
    let rows = count_by(&disclosures(), Dimension::TypeStructure).unwrap();
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.value.to_string(), r.n_bilans, r.n_entites))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Entreprise".to_string(), 3, 2),
            ("Établissement public".to_string(), 2, 1),
            ("Association".to_string(), 1, 1),
            ("Collectivité territoriale (dont EPCI)".to_string(), 1, 1),
        ]
    );
    let total: usize = rows.iter().map(|r| r.n_bilans).sum();
    assert_eq!(total, 7);
}

#[test]
fn company_sizes() {
    let breakdown = company_size_breakdown(&disclosures(), Some("Entreprise"));
    assert_eq!(
        breakdown.numbers,
        SizeNumbers {
            total: 3,
            at_least_500: 2,
            less_than_500: 0,
            unknown: 1,
        }
    );
    let ranges: Vec<_> = breakdown
        .rows
        .iter()
        .map(|r| r.nb_salaries_range.as_deref())
        .collect();
    assert_eq!(ranges, vec![Some("500-999"), Some("1000-1999"), None]);
}

#[test]
fn publication_calendar() {
    let df = disclosures();

    let lags = publication_lag_counts(&df);
    let summary: Vec<_> = lags
        .iter()
        .map(|l| (l.annee_publication, l.lag.as_str(), l.n_bilans))
        .collect();
    assert_eq!(
        summary,
        vec![(2021, "N-1", 1), (2022, "N-1", 2), (2023, "N-1", 3), (2024, "N-1", 1)]
    );

    let months: Vec<_> = publication_month_counts(&df)
        .iter()
        .map(|m| (m.name, m.n_bilans))
        .collect();
    assert_eq!(
        months,
        vec![
            ("janvier", 2),
            ("février", 1),
            ("mars", 1),
            ("juin", 1),
            ("septembre", 1),
            ("décembre", 1),
        ]
    );

    let years = year_counts(&df);
    let y2022 = years.iter().find(|y| y.year == 2022).unwrap();
    assert_eq!((y2022.publication, y2022.reporting), (2, 3));
}

#[test]
fn coverage_against_obliges() {
    let config = fixture_config();
    let obliges = load_obliges(&config.obliges_annex_path()).unwrap();
    assert_eq!(obliges.len(), 4);
    assert_eq!(obliges[1].taux_conformite, 50.0);

    let coverage = naf_coverage(&disclosures(), &obliges);
    let codes: Vec<_> = coverage.iter().map(|c| c.naf2_code.as_str()).collect();
    assert_eq!(codes, vec!["35", "64", "84"]);

    let ratios: Vec<f64> = coverage.iter().map(|c| c.ratio.unwrap()).collect();
    assert_relative_eq!(ratios[0], 0.25);
    assert_relative_eq!(ratios[1], 0.5);
    assert_relative_eq!(ratios[2], 2.0);
    assert_eq!(coverage[2].n_bilans, 3);
    assert_eq!(coverage[2].n_entites, 2);
}
