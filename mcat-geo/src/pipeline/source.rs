//! Lecture des features d'un fichier de géométrie
//!
//! `GeometrySource` est le point d'extension; `G01Source` lit les fichiers
//! texte .g01 depuis S3 avec `ras-geometry`, reprojette en EPSG:4326 et
//! encode en WKB.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use wkb::geom_to_wkb;

use ras_geometry::{ByClass, FeatureClass, ParseResult};

use crate::error::{PipelineError, SourceError, ValidationError};
use crate::export::reproject::Reprojector;
use crate::export::storage::ArtifactStore;

/// EPSG des géométries produites
pub const OUTPUT_EPSG: u32 = 4326;

/// Albers USGS, NAD83, en pieds US (WKT2)
pub const WKT_USACE_PROJ: &str = concat!(
    r#"PROJCRS["USA_Contiguous_Albers_Equal_Area_Conic_USGS_version","#,
    r#"BASEGEOGCRS["NAD83",DATUM["North American Datum 1983","#,
    r#"ELLIPSOID["GRS 1980",6378137,298.257222101,LENGTHUNIT["metre",1]],ID["EPSG",6269]],"#,
    r#"PRIMEM["Greenwich",0,ANGLEUNIT["Degree",0.0174532925199433]]],"#,
    r#"CONVERSION["unnamed",METHOD["Albers Equal Area",ID["EPSG",9822]],"#,
    r#"PARAMETER["Latitude of false origin",23,ANGLEUNIT["Degree",0.0174532925199433],ID["EPSG",8821]],"#,
    r#"PARAMETER["Longitude of false origin",-96,ANGLEUNIT["Degree",0.0174532925199433],ID["EPSG",8822]],"#,
    r#"PARAMETER["Latitude of 1st standard parallel",29.5,ANGLEUNIT["Degree",0.0174532925199433],ID["EPSG",8823]],"#,
    r#"PARAMETER["Latitude of 2nd standard parallel",45.5,ANGLEUNIT["Degree",0.0174532925199433],ID["EPSG",8824]],"#,
    r#"PARAMETER["Easting at false origin",0,LENGTHUNIT["US survey foot",0.304800609601219],ID["EPSG",8826]],"#,
    r#"PARAMETER["Northing at false origin",0,LENGTHUNIT["US survey foot",0.304800609601219],ID["EPSG",8827]]],"#,
    r#"CS[Cartesian,2],"#,
    r#"AXIS["(E)",east,ORDER[1],LENGTHUNIT["US survey foot",0.304800609601219,ID["EPSG",9003]]],"#,
    r#"AXIS["(N)",north,ORDER[2],LENGTHUNIT["US survey foot",0.304800609601219,ID["EPSG",9003]]]]"#,
);

/// Albers USGS, NAD83, en mètres (EPSG:5070)
pub const WKT_USACE_PROJ_ALT: &str = concat!(
    r#"PROJCS["USA_Contiguous_Albers_Equal_Area_Conic_USGS_version","#,
    r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983","#,
    r#"SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],"#,
    r#"PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],"#,
    r#"UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]],"#,
    r#"PROJECTION["Albers_Conic_Equal_Area"],"#,
    r#"PARAMETER["latitude_of_center",23],PARAMETER["longitude_of_center",-96],"#,
    r#"PARAMETER["standard_parallel_1",29.5],PARAMETER["standard_parallel_2",45.5],"#,
    r#"PARAMETER["false_easting",0],PARAMETER["false_northing",0],"#,
    r#"UNIT["metre",1,AUTHORITY["EPSG","9001"]],"#,
    r#"AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","5070"]]"#,
);

/// Albers USGS, NAD83, pieds US, origine à 37.5°N (WKT ESRI)
pub const WKT_USACE_PROJ_FT_37_5: &str = concat!(
    r#"PROJCS["USA_Contiguous_Albers_Equal_Area_Conic_USGS_version","#,
    r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983","#,
    r#"SPHEROID["GRS_1980",6378137.0,298.257222101]],"#,
    r#"PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],"#,
    r#"PROJECTION["Albers"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],"#,
    r#"PARAMETER["Central_Meridian",-96.0],PARAMETER["Standard_Parallel_1",29.5],"#,
    r#"PARAMETER["Standard_Parallel_2",45.5],PARAMETER["Latitude_Of_Origin",37.5],"#,
    r#"UNIT["Foot_US",0.3048006096012192]]"#,
);

/// Projection source d'un modèle, désignée par son nom court
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// `wktUSACEProj`
    UsaceProj,
    /// `wktUSACEProjAlt`
    UsaceProjAlt,
    /// `WktUSACEProjFt37_5`
    UsaceProjFt37_5,
}

impl Projection {
    pub const ALL: [Projection; 3] = [
        Projection::UsaceProj,
        Projection::UsaceProjAlt,
        Projection::UsaceProjFt37_5,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Projection::UsaceProj => "wktUSACEProj",
            Projection::UsaceProjAlt => "wktUSACEProjAlt",
            Projection::UsaceProjFt37_5 => "WktUSACEProjFt37_5",
        }
    }

    /// Définition WKT canonique
    pub fn wkt(&self) -> &'static str {
        match self {
            Projection::UsaceProj => WKT_USACE_PROJ,
            Projection::UsaceProjAlt => WKT_USACE_PROJ_ALT,
            Projection::UsaceProjFt37_5 => WKT_USACE_PROJ_FT_37_5,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Projection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Projection::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ValidationError::UnknownProjection(s.to_string()))
    }
}

/// Une feature extraite, géométrie en WKB EPSG:4326
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub feature_class: FeatureClass,
    pub feature_name: String,
    pub raw_geometry: Vec<u8>,
    /// Clé S3 du fichier source
    pub source_file: String,
}

/// Source de features brutes par classe
#[async_trait]
pub trait GeometrySource: Send + Sync {
    /// Lit `key` dans `bucket` et reprojette depuis `source_wkt` vers EPSG:4326
    async fn read(
        &self,
        bucket: &str,
        key: &str,
        source_wkt: &str,
    ) -> Result<ByClass<FeatureRecord>, SourceError>;
}

/// Lecteur de fichiers .g01 stockés sur S3
pub struct G01Source {
    store: Arc<dyn ArtifactStore>,
}

impl G01Source {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GeometrySource for G01Source {
    async fn read(
        &self,
        bucket: &str,
        key: &str,
        source_wkt: &str,
    ) -> Result<ByClass<FeatureRecord>, SourceError> {
        let data = self.store.get(bucket, key).await?;
        debug!(key = %key, size = data.len(), "Downloaded geometry file");

        let key = key.to_string();
        let source_wkt = source_wkt.to_string();

        // Parsing et PROJ hors du runtime async (Proj n'est pas Send)
        tokio::task::spawn_blocking(move || {
            let parsed = ras_geometry::parse(&data)?;
            records_from_parse(parsed, &key, &source_wkt)
        })
        .await
        .map_err(|e| SourceError::Task(e.to_string()))?
    }
}

/// Reprojette et encode les features d'un fichier parsé
pub fn records_from_parse(
    parsed: ParseResult,
    source_file: &str,
    source_wkt: &str,
) -> Result<ByClass<FeatureRecord>, SourceError> {
    for error in &parsed.errors {
        warn!(file = %source_file, error = %error, "Skipped geometry entity");
    }

    let reprojector = Reprojector::new(source_wkt, OUTPUT_EPSG)
        .map_err(|e| SourceError::Reproject(format!("{:#}", e)))?;

    let records = parsed.features.try_map(|class, feature| -> Result<_, SourceError> {
        let geometry = reprojector
            .transform_geometry(&feature.geometry)
            .map_err(|e| SourceError::Reproject(format!("{}: {:#}", feature.name, e)))?;
        let raw_geometry = geom_to_wkb(&geometry).map_err(|e| SourceError::Encode {
            feature: feature.name.clone(),
            reason: format!("{:?}", e),
        })?;
        Ok(FeatureRecord {
            feature_class: class,
            feature_name: feature.name,
            raw_geometry,
            source_file: source_file.to_string(),
        })
    })?;

    info!(
        file = %source_file,
        title = %parsed.title,
        features = records.len(),
        skipped = parsed.errors.len(),
        "Extracted geometry"
    );
    Ok(records)
}

/// Résout la projection et lit le fichier via la source
pub async fn fetch_features(
    source: &dyn GeometrySource,
    bucket: &str,
    key: &str,
    projection: Projection,
) -> Result<ByClass<FeatureRecord>, PipelineError> {
    debug!(key = %key, projection = %projection, "Fetching features");
    source
        .read(bucket, key, projection.wkt())
        .await
        .map_err(|source| PipelineError::SourceRead {
            key: key.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_names() {
        for projection in Projection::ALL {
            assert_eq!(projection.name().parse::<Projection>().unwrap(), projection);
        }
        assert_eq!(
            "EPSG:5070".parse::<Projection>(),
            Err(ValidationError::UnknownProjection("EPSG:5070".into()))
        );
    }

    #[test]
    fn test_wkt_constants() {
        assert!(WKT_USACE_PROJ.starts_with("PROJCRS["));
        assert!(WKT_USACE_PROJ_ALT.ends_with(r#"AUTHORITY["EPSG","5070"]]"#));
        assert!(WKT_USACE_PROJ_FT_37_5.contains(r#"PARAMETER["Latitude_Of_Origin",37.5]"#));
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_records_from_parse() {
        let data = b"Geom Title=T\n\
BreakLine Name=Levee\n\
BreakLine Polyline= 2\n\
             0.0             0.0          1000.0          1000.0\n";
        let parsed = ras_geometry::parse(data).unwrap();
        let records =
            records_from_parse(parsed, "models/t.g01", Projection::UsaceProjAlt.wkt()).unwrap();

        let breaklines = records.get(FeatureClass::Breakline);
        assert_eq!(breaklines.len(), 1);
        assert_eq!(breaklines[0].feature_name, "Levee");
        assert_eq!(breaklines[0].source_file, "models/t.g01");
        // WKB little-endian LineString
        assert_eq!(breaklines[0].raw_geometry[0], 1);
        assert_eq!(&breaklines[0].raw_geometry[1..5], &[2, 0, 0, 0]);
    }
}
