//! Reprojection de géométries avec PROJ
//!
//! Le CRS source est une définition quelconque acceptée par PROJ
//! (WKT1, WKT2, `EPSG:xxxx`). Ce module n'effectue de vraie reprojection
//! qu'avec le feature `reproject`.

#[cfg(feature = "reproject")]
use anyhow::{Context, Result};
#[cfg(feature = "reproject")]
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Reprojection de géométries vers un EPSG cible
#[cfg(feature = "reproject")]
pub struct Reprojector {
    proj: Proj,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un reprojector depuis une définition de CRS (WKT ou code)
    pub fn new(source_crs: &str, target_epsg: u32) -> Result<Self> {
        let target = format!("EPSG:{}", target_epsg);

        // new_known_crs normalise l'ordre des axes (lon, lat)
        let proj = Proj::new_known_crs(source_crs, &target, None).context(format!(
            "Failed to create projection from {} to {}",
            summarize_crs(source_crs),
            target
        ))?;

        Ok(Self { proj })
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match geom {
            Geometry::Point(p) => {
                let (x, y) = self.transform_coord(p.0)?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(self.transform_linestring(ls)?)),
            Geometry::Polygon(p) => Ok(Geometry::Polygon(self.transform_polygon(p)?)),
            Geometry::MultiPoint(mp) => {
                // Conversion batch des points via une LineString temporaire
                let coords = LineString::new(mp.0.iter().map(|p| p.0).collect());
                let transformed = self.transform_linestring(&coords)?;
                Ok(Geometry::MultiPoint(MultiPoint::new(
                    transformed.0.into_iter().map(Point::from).collect(),
                )))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>> = mls
                    .0
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.0.iter().map(|p| self.transform_polygon(p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            other => anyhow::bail!("Unsupported geometry type for reprojection: {:?}", other),
        }
    }

    /// Transforme une coordonnée unique
    fn transform_coord(&self, coord: Coord) -> Result<(f64, f64)> {
        self.proj
            .convert((coord.x, coord.y))
            .context("Coordinate transformation failed")
    }

    /// Transforme une LineString (conversion batch)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;

        let result: Vec<Coord> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
        Ok(LineString::new(result))
    }

    /// Transforme un Polygon
    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

/// Première ligne d'une définition WKT, pour les messages d'erreur
fn summarize_crs(crs: &str) -> &str {
    let first = crs.lines().next().unwrap_or(crs).trim();
    first.trim_end_matches(',')
}

#[cfg(feature = "reproject")]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::Projection;

    #[test]
    fn test_albers_origin_to_wgs84() {
        // L'origine de l'Albers USGS est (lon -96, lat 23)
        let reprojector = Reprojector::new(Projection::UsaceProjAlt.wkt(), 4326).unwrap();

        let origin = Geometry::Point(Point::new(0.0, 0.0));
        match reprojector.transform_geometry(&origin).unwrap() {
            Geometry::Point(p) => {
                assert!((p.x() + 96.0).abs() < 1e-6, "lon should be -96, got {}", p.x());
                assert!((p.y() - 23.0).abs() < 1e-6, "lat should be 23, got {}", p.y());
            }
            other => panic!("Expected Point geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_feet_projections_differ_from_metres() {
        // 1 000 000 ft US ≈ 304.8 km: le point doit rester dans la zone CONUS
        let feet = Reprojector::new(Projection::UsaceProj.wkt(), 4326).unwrap();
        let metres = Reprojector::new(Projection::UsaceProjAlt.wkt(), 4326).unwrap();

        let point = Geometry::Point(Point::new(1_000_000.0, 1_000_000.0));
        let (Geometry::Point(a), Geometry::Point(b)) = (
            feet.transform_geometry(&point).unwrap(),
            metres.transform_geometry(&point).unwrap(),
        ) else {
            panic!("Expected Point geometries");
        };

        assert!(a.x() > -96.0 && a.x() < -90.0, "got lon {}", a.x());
        assert!(a.y() > 23.0 && a.y() < 35.0, "got lat {}", a.y());
        assert!((a.x() - b.x()).abs() > 1.0);
    }

    #[test]
    fn test_polygon_transform() {
        let reprojector = Reprojector::new(Projection::UsaceProjFt37_5.wkt(), 4326).unwrap();

        let poly = Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (1000.0, 0.0),
                (1000.0, 1000.0),
                (0.0, 1000.0),
                (0.0, 0.0),
            ]),
            vec![],
        ));

        match reprojector.transform_geometry(&poly).unwrap() {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                let first = &p.exterior().0[0];
                // Origine décalée à 37.5°N pour cette variante
                assert!((first.x + 96.0).abs() < 1e-6);
                assert!((first.y - 37.5).abs() < 1e-6);
            }
            other => panic!("Expected Polygon geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_multipoint_transform() {
        let reprojector = Reprojector::new("EPSG:4326", 4326).unwrap();
        let points = Geometry::MultiPoint(MultiPoint::new(vec![
            Point::new(-90.0, 35.0),
            Point::new(-91.0, 36.0),
        ]));
        match reprojector.transform_geometry(&points).unwrap() {
            Geometry::MultiPoint(mp) => {
                assert_eq!(mp.0.len(), 2);
                assert!((mp.0[1].x() + 91.0).abs() < 1e-9);
            }
            other => panic!("Expected MultiPoint geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_crs() {
        assert!(Reprojector::new("PROJCS[\"broken\"", 4326).is_err());
    }
}

/// Vérifie si la reprojection est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

// Implémentation factice quand le feature reproject est désactivé
#[cfg(not(feature = "reproject"))]
use anyhow::{bail, Result};
#[cfg(not(feature = "reproject"))]
use geo::Geometry;

/// Reprojector factice: seule l'identité est acceptée
#[cfg(not(feature = "reproject"))]
pub struct Reprojector;

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Échoue sauf si la source est déjà le CRS cible
    pub fn new(source_crs: &str, target_epsg: u32) -> Result<Self> {
        if source_crs == format!("EPSG:{}", target_epsg) {
            Ok(Self)
        } else {
            bail!(
                "Reprojection from {} to EPSG:{} requires the 'reproject' feature. \
                 Build with: cargo build --features reproject",
                summarize_crs(source_crs),
                target_epsg
            )
        }
    }

    /// Retourne la géométrie inchangée
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        Ok(geom.clone())
    }
}
