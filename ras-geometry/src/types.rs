//! Types de données pour le crate ras-geometry

use std::fmt;
use std::str::FromStr;

use geo::Geometry;

use crate::GeometryError;

/// Classe de features extraite d'un fichier de géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureClass {
    /// Maillage 2D (périmètres, points de calcul, cellules)
    Mesh,
    /// Lignes de rupture
    Breakline,
    /// Zones d'écoulement 2D
    TwoDArea,
    /// Zones de stockage 1D et autres géométries non classées
    Other,
}

impl FeatureClass {
    /// Toutes les classes, dans l'ordre d'énumération de `ByClass`
    pub const ALL: [FeatureClass; 4] = [
        FeatureClass::Mesh,
        FeatureClass::Breakline,
        FeatureClass::TwoDArea,
        FeatureClass::Other,
    ];

    /// Identifiant stable (utilisé dans les requêtes et les noms de fichiers)
    pub fn id(&self) -> &'static str {
        match self {
            FeatureClass::Mesh => "mesh",
            FeatureClass::Breakline => "breakline",
            FeatureClass::TwoDArea => "twodarea",
            FeatureClass::Other => "other",
        }
    }
}

impl fmt::Display for FeatureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FeatureClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureClass::ALL
            .into_iter()
            .find(|class| class.id() == s)
            .ok_or_else(|| format!("Unknown feature class: {}", s))
    }
}

/// Conteneur indexé par classe de features.
///
/// Chaque classe a son propre slot; `get` est exhaustif sur `FeatureClass`,
/// donc l'ajout d'une classe oblige à compléter ce conteneur.
#[derive(Debug, Clone, PartialEq)]
pub struct ByClass<T> {
    mesh: Vec<T>,
    breaklines: Vec<T>,
    two_d_areas: Vec<T>,
    other: Vec<T>,
}

impl<T> Default for ByClass<T> {
    fn default() -> Self {
        Self {
            mesh: Vec::new(),
            breaklines: Vec::new(),
            two_d_areas: Vec::new(),
            other: Vec::new(),
        }
    }
}

impl<T> ByClass<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice des features d'une classe
    pub fn get(&self, class: FeatureClass) -> &[T] {
        match class {
            FeatureClass::Mesh => &self.mesh,
            FeatureClass::Breakline => &self.breaklines,
            FeatureClass::TwoDArea => &self.two_d_areas,
            FeatureClass::Other => &self.other,
        }
    }

    fn slot_mut(&mut self, class: FeatureClass) -> &mut Vec<T> {
        match class {
            FeatureClass::Mesh => &mut self.mesh,
            FeatureClass::Breakline => &mut self.breaklines,
            FeatureClass::TwoDArea => &mut self.two_d_areas,
            FeatureClass::Other => &mut self.other,
        }
    }

    /// Ajoute une feature à une classe
    pub fn push(&mut self, class: FeatureClass, item: T) {
        self.slot_mut(class).push(item);
    }

    /// Itère sur les classes (ordre de `FeatureClass::ALL`), y compris vides
    pub fn iter(&self) -> impl Iterator<Item = (FeatureClass, &[T])> {
        FeatureClass::ALL
            .into_iter()
            .map(move |class| (class, self.get(class)))
    }

    /// Itère uniquement sur les classes non vides
    pub fn non_empty(&self) -> impl Iterator<Item = (FeatureClass, &[T])> {
        self.iter().filter(|(_, items)| !items.is_empty())
    }

    /// Nombre total de features toutes classes confondues
    pub fn len(&self) -> usize {
        self.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transforme chaque élément en conservant sa classe.
    ///
    /// S'arrête à la première erreur.
    pub fn try_map<U, E, F>(self, mut f: F) -> Result<ByClass<U>, E>
    where
        F: FnMut(FeatureClass, T) -> Result<U, E>,
    {
        let mut out = ByClass::new();
        let Self {
            mesh,
            breaklines,
            two_d_areas,
            other,
        } = self;
        for (class, items) in [
            (FeatureClass::Mesh, mesh),
            (FeatureClass::Breakline, breaklines),
            (FeatureClass::TwoDArea, two_d_areas),
            (FeatureClass::Other, other),
        ] {
            for item in items {
                out.push(class, f(class, item)?);
            }
        }
        Ok(out)
    }
}

/// Une feature vectorielle nommée, en coordonnées du modèle
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    /// Nom de la feature (unique dans sa classe pour un fichier donné)
    pub name: String,

    /// Géométrie (LineString, Polygon, MultiPoint, MultiLineString)
    pub geometry: Geometry,
}

/// Résultat de la lecture d'un fichier .g01
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Titre de la géométrie (`Geom Title=`)
    pub title: String,

    /// Version du programme ayant écrit le fichier (`Program Version=`)
    pub program_version: Option<String>,

    /// Features groupées par classe
    pub features: ByClass<VectorFeature>,

    /// Erreurs non fatales rencontrées pendant la lecture
    pub errors: Vec<GeometryError>,
}
