//! Sélection des classes demandées

use std::collections::BTreeMap;

use tracing::debug;

use ras_geometry::{ByClass, FeatureClass};

use crate::error::PipelineError;
use crate::pipeline::source::FeatureRecord;
use crate::pipeline::validate::ALL_ELEMENTS;

/// Groupes de sortie: clé (id de classe ou nom de feature maillage) → features
pub type FeatureGroups = BTreeMap<String, Vec<FeatureRecord>>;

/// Regroupe les features selon les éléments demandés.
///
/// Avec `all`, chaque classe non vide devient un groupe. Le maillage est
/// toujours éclaté en un groupe par nom de feature.
pub fn filter_features(
    features: &ByClass<FeatureRecord>,
    requested: &[String],
) -> Result<FeatureGroups, PipelineError> {
    let mut groups = FeatureGroups::new();

    if requested.iter().any(|r| r == ALL_ELEMENTS) {
        debug!("Selecting all feature classes");
        for (class, records) in features.non_empty() {
            insert_class(&mut groups, class, records);
        }
        return Ok(groups);
    }

    for element in requested {
        let class = match element.as_str() {
            "mesh" => FeatureClass::Mesh,
            "breakline" => FeatureClass::Breakline,
            "twodarea" => FeatureClass::TwoDArea,
            other => return Err(PipelineError::InvalidElement(other.to_string())),
        };
        debug!(class = %class, count = features.get(class).len(), "Selecting feature class");

        let records = features.get(class);
        if records.is_empty() {
            // Une classe demandée mais vide produit une collection vide
            groups.entry(class.id().to_string()).or_default();
        } else {
            insert_class(&mut groups, class, records);
        }
    }

    Ok(groups)
}

fn insert_class(groups: &mut FeatureGroups, class: FeatureClass, records: &[FeatureRecord]) {
    match class {
        FeatureClass::Mesh => {
            for record in records {
                groups.insert(record.feature_name.clone(), vec![record.clone()]);
            }
        }
        _ => {
            groups.insert(class.id().to_string(), records.to_vec());
        }
    }
}

/// Features d'une seule classe (chemin de rafraîchissement du cache)
pub fn class_slice(features: &ByClass<FeatureRecord>, class: FeatureClass) -> &[FeatureRecord] {
    features.get(class)
}
