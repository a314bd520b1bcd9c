//! Conversion WKB → GeoJSON avec geozero

use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use geozero::geojson::GeoJsonWriter;
use geozero::wkb::Wkb;
use geozero::GeozeroGeometry;

use crate::error::{ConversionError, PipelineError};
use crate::pipeline::source::FeatureRecord;

/// Convertit une géométrie WKB en géométrie GeoJSON
pub trait GeometryConverter: Send + Sync {
    /// `source_srs` n'annote que les erreurs: le WKB est déjà en EPSG:4326
    fn to_geojson(&self, wkb: &[u8], source_srs: &str) -> Result<geojson::Geometry, ConversionError>;
}

/// Convertisseur geozero (streaming, sans passer par `geo`)
#[derive(Debug, Default, Clone, Copy)]
pub struct WkbConverter;

impl GeometryConverter for WkbConverter {
    fn to_geojson(&self, wkb: &[u8], source_srs: &str) -> Result<geojson::Geometry, ConversionError> {
        let mut buf = Vec::new();
        let mut writer = GeoJsonWriter::new(&mut buf);
        Wkb(wkb.to_vec())
            .process_geom(&mut writer)
            .map_err(|e| ConversionError::new(format!("invalid WKB ({}): {}", source_srs, e)))?;

        serde_json::from_slice(&buf)
            .map_err(|e| ConversionError::new(format!("invalid GeoJSON geometry: {}", e)))
    }
}

/// Construit une FeatureCollection, propriété `Name` = nom de feature.
///
/// La première erreur de conversion interrompt la construction.
pub fn build_collection(
    records: &[FeatureRecord],
    converter: &dyn GeometryConverter,
    source_srs: &str,
) -> Result<FeatureCollection, PipelineError> {
    let features = records
        .iter()
        .map(|record| {
            let geometry = converter
                .to_geojson(&record.raw_geometry, source_srs)
                .map_err(|e| PipelineError::Conversion {
                    feature: record.feature_name.clone(),
                    reason: e.reason,
                })?;

            let mut properties = JsonObject::new();
            properties.insert(
                "Name".to_string(),
                JsonValue::String(record.feature_name.clone()),
            );

            Ok(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Une collection par groupe, mêmes clés
pub fn build_collections(
    groups: &BTreeMap<String, Vec<FeatureRecord>>,
    converter: &dyn GeometryConverter,
    source_srs: &str,
) -> Result<BTreeMap<String, FeatureCollection>, PipelineError> {
    groups
        .iter()
        .map(|(key, records)| Ok((key.clone(), build_collection(records, converter, source_srs)?)))
        .collect()
}
