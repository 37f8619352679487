//! Row builders for unit tests.

use carbontrackr_pipeline::reshape::{clip_emissions, emissions_per_employee};
use carbontrackr_pipeline::BenchmarkRecord;
use carbontrackr_refdata::Scope;

/// A long-table row of an "Entreprise" in section M, reporting for 2021.
pub(crate) fn record(id: u64, poste: &str, emissions: Option<f64>, mean: Option<f64>) -> BenchmarkRecord {
    let scope = Scope::from_poste_code(poste).unwrap_or(Scope::Scope3);
    let category = poste.split('.').next().unwrap_or_default();
    BenchmarkRecord {
        id,
        siren: format!("{:09}", id % 2),
        methode_beges: Some("V5".into()),
        type_structure: Some("Entreprise".into()),
        type_collectivite: None,
        mode_consolidation: Some("Opérationnel".into()),
        recalcul: None,
        comparaison_precedent: None,
        nb_salaries_range: None,
        nb_salaries_min: None,
        nb_salaries_max: None,
        nb_salaries_mean: mean,
        naf5: Some("71.12B".into()),
        naf1: Some("Activités spécialisées, scientifiques et techniques".into()),
        naf2: None,
        naf3: None,
        naf4: None,
        month_publication: None,
        annee_reporting: Some(2021),
        poste_emissions: poste.to_string(),
        scope,
        poste_name: format!("{category} - catégorie {category}"),
        sub_poste_name: format!("{poste} - poste {poste}"),
        emissions,
        emissions_par_salarie: emissions_per_employee(emissions, mean),
        emissions_clipped: clip_emissions(emissions),
    }
}
