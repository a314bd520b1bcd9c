//! Construction des géométries `geo` à partir des enregistrements lus

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, Point, Polygon};
use tracing::warn;

use crate::parser::g01::ParsedG01;
use crate::types::{ByClass, FeatureClass, VectorFeature};
use crate::GeometryError;

/// Nom de la feature maillage regroupant les périmètres des zones 2D
pub const MESH_PERIMETER: &str = "mesh_perimeter";

/// Nom de la feature maillage regroupant les points de calcul
pub const MESH_POINTS: &str = "mesh_points";

/// Construit les features classées.
///
/// Une entité invalide est ignorée et signalée dans `errors`.
pub fn build_features(
    parsed: &ParsedG01,
    errors: &mut Vec<GeometryError>,
) -> ByClass<VectorFeature> {
    let mut features = ByClass::new();
    let mut perimeters = Vec::new();
    let mut mesh_points = Vec::new();

    for area in &parsed.storage_areas {
        let class = if area.is_2d {
            FeatureClass::TwoDArea
        } else {
            FeatureClass::Other
        };

        match build_polygon(&area.name, &area.perimeter) {
            Ok(polygon) => {
                if area.is_2d {
                    perimeters.push(polygon.exterior().clone());
                }
                features.push(
                    class,
                    VectorFeature {
                        name: area.name.clone(),
                        geometry: Geometry::Polygon(polygon),
                    },
                );
            }
            Err(e) => {
                warn!(name = %area.name, line = area.line, error = %e, "Skipping storage area");
                errors.push(e);
            }
        }

        if area.is_2d {
            mesh_points.extend(area.points.iter().map(|&(x, y)| Point::new(x, y)));
        }
    }

    for breakline in &parsed.breaklines {
        if breakline.polyline.len() < 2 {
            let e = GeometryError::invalid_geometry(
                &breakline.name,
                format!("breakline needs 2 points, found {}", breakline.polyline.len()),
            );
            warn!(name = %breakline.name, line = breakline.line, error = %e, "Skipping breakline");
            errors.push(e);
            continue;
        }
        features.push(
            FeatureClass::Breakline,
            VectorFeature {
                name: breakline.name.clone(),
                geometry: Geometry::LineString(to_line_string(&breakline.polyline)),
            },
        );
    }

    if !perimeters.is_empty() {
        features.push(
            FeatureClass::Mesh,
            VectorFeature {
                name: MESH_PERIMETER.to_string(),
                geometry: Geometry::MultiLineString(MultiLineString::new(perimeters)),
            },
        );
    }
    if !mesh_points.is_empty() {
        features.push(
            FeatureClass::Mesh,
            VectorFeature {
                name: MESH_POINTS.to_string(),
                geometry: Geometry::MultiPoint(MultiPoint::new(mesh_points)),
            },
        );
    }

    features
}

fn to_line_string(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::new(points.iter().map(|&(x, y)| Coord { x, y }).collect())
}

/// Polygone fermé à partir d'un périmètre (fermeture implicite dans le fichier)
fn build_polygon(name: &str, perimeter: &[(f64, f64)]) -> Result<Polygon<f64>, GeometryError> {
    let mut distinct = perimeter.to_vec();
    if distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(GeometryError::invalid_geometry(
            name,
            format!("perimeter needs 3 distinct points, found {}", distinct.len()),
        ));
    }
    // Polygon::new ferme l'anneau
    Ok(Polygon::new(to_line_string(&distinct), vec![]))
}
