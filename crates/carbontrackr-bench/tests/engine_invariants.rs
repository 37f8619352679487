use approx::assert_relative_eq;
use carbontrackr_bench::filter::filter_spec;
use carbontrackr_bench::{
    aggregate_bilans, filter_options, n_bilans, Dimension, FilterRequest, GroupValue, Kwarg,
    Metric, Sector, Selection, FILTERS,
};
use carbontrackr_pipeline::{build_datasets, BenchmarkRecord, PipelineConfig};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

fn fixture_config() -> PipelineConfig {
    let data_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/data");
    PipelineConfig {
        raw_export: PathBuf::from("raw/heavy/export-inventaires-fixture.csv"),
        ..PipelineConfig::with_data_dir(data_dir)
    }
}

fn df() -> &'static [BenchmarkRecord] {
    static DF: OnceLock<Vec<BenchmarkRecord>> = OnceLock::new();
    DF.get_or_init(|| build_datasets(&fixture_config()).unwrap().benchmark)
}

/// Straight masking of the long table, without the engine.
fn masked(df: &[BenchmarkRecord], selections: &BTreeMap<String, Selection>, metric: Metric) -> Vec<BenchmarkRecord> {
    let mut rows: Vec<BenchmarkRecord> = df.to_vec();
    for (name, selection) in selections {
        if selection.all {
            continue;
        }
        let dimension = filter_spec(name).unwrap().dimension;
        rows.retain(|r| {
            dimension
                .value(r)
                .is_some_and(|v| selection.options.contains(&v.to_string()))
        });
    }
    rows.retain(|r| metric.value(r).unwrap_or(0.0) != 0.0);
    rows
}

fn sums_by_group(rows: impl IntoIterator<Item = (String, f64)>) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (group, value) in rows {
        *out.entry(group).or_insert(0.0) += value;
    }
    out
}

fn assert_same_sums(left: &BTreeMap<String, f64>, right: &BTreeMap<String, f64>) {
    assert_eq!(left.keys().collect::<Vec<_>>(), right.keys().collect::<Vec<_>>());
    for (group, value) in left {
        assert_relative_eq!(*value, right[group], epsilon = 1e-6, max_relative = 1e-9);
    }
}

/// Group label of a row, nulls included.
fn group_of(group_by: Dimension, row: &BenchmarkRecord) -> String {
    group_by
        .value(row)
        .unwrap_or(GroupValue::Missing)
        .to_string()
}

fn check_request(request: &FilterRequest, group_by: Dimension) {
    let df = df();
    let filtered = filter_options(df, request).unwrap();
    let expected = masked(df, &request.selections, request.metric);
    assert_eq!(filtered, expected);

    let bilans = aggregate_bilans(&filtered, group_by);

    let direct = sums_by_group(
        expected
            .iter()
            .map(|r| (group_of(group_by, r), r.emissions.unwrap_or(0.0))),
    );
    let engine = sums_by_group(
        bilans
            .iter()
            .map(|b| (b.group.to_string(), b.emissions.unwrap_or(0.0))),
    );
    assert_same_sums(&direct, &engine);

    let filtered_total: f64 = expected.iter().filter_map(|r| r.emissions).sum();
    let aggregated_total: f64 = bilans.iter().filter_map(|b| b.emissions).sum();
    assert_relative_eq!(filtered_total, aggregated_total, epsilon = 1e-6, max_relative = 1e-9);

    if request.metric == Metric::EmissionsParSalarie {
        let intensity = sums_by_group(bilans.iter().map(|b| {
            (
                b.group.to_string(),
                b.emissions_par_salarie.unwrap() * b.nb_salaries_mean.unwrap(),
            )
        }));
        assert_same_sums(&direct, &intensity);
    }

    let pairs: BTreeSet<(String, u64)> = expected
        .iter()
        .map(|r| (group_of(group_by, r), r.id))
        .collect();
    assert_eq!(bilans.len(), pairs.len());
    if group_by.is_intra() {
        assert!(bilans.len() >= n_bilans(&expected));
    } else {
        assert_eq!(bilans.len(), n_bilans(&expected));
    }
}

#[test]
fn select_all_drops_only_null_and_zero_rows() {
    let df = df();
    let mut kwargs: Vec<(String, Kwarg)> = Vec::new();
    for spec in FILTERS {
        kwargs.push((format!("{}_all", spec.name), Kwarg::Flag(true)));
        kwargs.push((format!("{}_options", spec.name), Kwarg::Options(vec![])));
    }
    let request = FilterRequest::from_kwargs(Sector::All, Metric::Emissions, kwargs).unwrap();
    let rows = filter_options(df, &request).unwrap();
    assert_eq!(rows.len(), 15);
    assert_eq!(n_bilans(&rows), 6);

    let per_employee = FilterRequest::new(Sector::All, Metric::EmissionsParSalarie);
    assert_eq!(filter_options(df, &per_employee).unwrap().len(), 13);
}

#[test]
fn disclosures_without_sector_keep_their_emissions() {
    let request = FilterRequest::new(Sector::All, Metric::Emissions);
    let filtered = filter_options(df(), &request).unwrap();
    let bilans = aggregate_bilans(&filtered, Dimension::SecteurActivite);
    assert_eq!(bilans.len(), n_bilans(&filtered));

    let unknown: Vec<u64> = bilans
        .iter()
        .filter(|b| b.group == GroupValue::Missing)
        .map(|b| b.id)
        .collect();
    assert_eq!(unknown, vec![104]);
    assert_eq!(bilans.last().map(|b| &b.group), Some(&GroupValue::Missing));

    let total: f64 = bilans.iter().filter_map(|b| b.emissions).sum();
    assert_relative_eq!(total, 44210.5);
}

#[test]
fn sector_filter_matches_section_label() {
    let request = FilterRequest::new(
        Sector::Label("Administration publique et défense ; sécurité sociale obligatoire".into()),
        Metric::Emissions,
    );
    let rows = filter_options(df(), &request).unwrap();
    let ids: BTreeSet<u64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, BTreeSet::from([103, 107]));
}

#[test]
fn entreprises_by_reporting_year() {
    let request = FilterRequest::new(Sector::All, Metric::Emissions)
        .select("type_structure", Selection::only(["Entreprise"]));
    let filtered = filter_options(df(), &request).unwrap();
    let bilans = aggregate_bilans(&filtered, Dimension::AnneeReporting);

    let summary: Vec<(String, u64, f64)> = bilans
        .iter()
        .map(|b| (b.group.to_string(), b.id, b.emissions.unwrap()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("2021".to_string(), 101, 1750.5),
            ("2022".to_string(), 102, 1450.0),
            ("2022".to_string(), 105, 500.0),
        ]
    );
    let total: f64 = filtered.iter().filter_map(|r| r.emissions).sum();
    assert_relative_eq!(total, 3700.5);
}

#[test]
fn grid_of_filters_and_dimensions() {
    let grid: Vec<(&str, Vec<Selection>)> = vec![
        (
            "type_structure",
            vec![
                Selection::all(),
                Selection::only(["Établissement public", "Entreprise"]),
            ],
        ),
        (
            "secteur_activite",
            vec![
                Selection::all(),
                Selection::only([
                    "Activités financières et d'assurance",
                    "Administration publique et défense ; sécurité sociale obligatoire",
                    "Enseignement",
                ]),
            ],
        ),
        (
            "category_emissions",
            vec![
                Selection::all(),
                Selection::only(["3 - Déplacement", "4 - Produits achetés", "2 - Énergie"]),
            ],
        ),
        (
            "poste_emissions",
            vec![
                Selection::all(),
                Selection::only([
                    "1.1 - Émissions directes des sources fixes de combustion",
                    "2.1 - Émissions indirectes liées à la consommation d'électricité",
                    "3.3 - Déplacements domicile-travail",
                    "6.1 - Autres émissions directes",
                ]),
            ],
        ),
        ("annee", vec![Selection::all(), Selection::only(["2021", "2022"])]),
        ("mode_consolidation", vec![Selection::all()]),
    ];

    let mut combos: Vec<BTreeMap<String, Selection>> = vec![BTreeMap::new()];
    for (name, choices) in &grid {
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                choices.iter().map(move |choice| {
                    let mut next = combo.clone();
                    next.insert(name.to_string(), choice.clone());
                    next
                })
            })
            .collect();
    }
    assert_eq!(combos.len(), 32);

    for selections in combos {
        for metric in [Metric::Emissions, Metric::EmissionsParSalarie] {
            let request = FilterRequest {
                sector: Sector::All,
                metric,
                selections: selections.clone(),
            };
            for group_by in Dimension::ALL {
                check_request(&request, group_by);
            }
        }
    }
}

fn selection_strategy(name: &'static str) -> impl Strategy<Value = Selection> {
    let dimension = filter_spec(name).unwrap().dimension;
    let values: Vec<String> = df()
        .iter()
        .filter_map(|r| dimension.value(r).map(|v| v.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    prop_oneof![
        Just(Selection::all()),
        proptest::sample::subsequence(values.clone(), 0..=values.len()).prop_map(Selection::only),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn filter_then_aggregate_preserves_group_sums(
        type_structure in selection_strategy("type_structure"),
        secteur in selection_strategy("secteur_activite"),
        poste in selection_strategy("poste_emissions"),
        annee in selection_strategy("annee"),
        per_employee in any::<bool>(),
        group_by in proptest::sample::select(Dimension::ALL.to_vec()),
    ) {
        let metric = if per_employee { Metric::EmissionsParSalarie } else { Metric::Emissions };
        let request = FilterRequest::new(Sector::All, metric)
            .select("type_structure", type_structure)
            .select("secteur_activite", secteur)
            .select("poste_emissions", poste)
            .select("annee", annee);
        check_request(&request, group_by);
    }
}
