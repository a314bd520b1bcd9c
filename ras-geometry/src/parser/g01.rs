//! Parser pour les fichiers de géométrie texte (.g01, .g02, ...)

use memchr::memchr;
use tracing::{debug, trace};

use super::coords::{parse_count, read_pairs};
use crate::GeometryError;

/// Zone de stockage (1D) ou zone d'écoulement 2D
#[derive(Debug, Clone, Default)]
pub struct StorageArea {
    pub name: String,
    /// Ligne (1-based) de l'en-tête `Storage Area=`
    pub line: usize,
    pub perimeter: Vec<(f64, f64)>,
    pub is_2d: bool,
    /// Points de calcul du maillage 2D
    pub points: Vec<(f64, f64)>,
}

/// Ligne de rupture
#[derive(Debug, Clone, Default)]
pub struct Breakline {
    pub name: String,
    pub line: usize,
    pub polyline: Vec<(f64, f64)>,
}

/// Résultat brut de la lecture d'un fichier .g01
#[derive(Debug, Default)]
pub struct ParsedG01 {
    pub title: Option<String>,
    pub program_version: Option<String>,
    pub storage_areas: Vec<StorageArea>,
    pub breaklines: Vec<Breakline>,
}

/// Bloc en cours de lecture
#[derive(Debug, Clone, Copy)]
enum Current {
    None,
    StorageArea(usize),
    Breakline(usize),
}

/// Parse un fichier .g01 décodé.
///
/// Les erreurs de coordonnées sont non fatales: le bloc concerné est
/// abandonné et l'erreur est ajoutée à `errors`.
pub fn parse(content: &str, errors: &mut Vec<GeometryError>) -> ParsedG01 {
    let lines: Vec<&str> = content.lines().collect();
    let mut parsed = ParsedG01::default();
    let mut current = Current::None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let line_no = i + 1;
        i += 1;

        let Some((key, value)) = split_record(line) else {
            continue;
        };

        match key {
            "Geom Title" => parsed.title = Some(value.trim().to_string()),
            "Program Version" => parsed.program_version = Some(value.trim().to_string()),
            "Storage Area" => {
                let name = value.split(',').next().unwrap_or("").trim().to_string();
                trace!(name = %name, line = line_no, "Storage area");
                parsed.storage_areas.push(StorageArea {
                    name,
                    line: line_no,
                    ..Default::default()
                });
                current = Current::StorageArea(parsed.storage_areas.len() - 1);
            }
            "BreakLine Name" => {
                let name = value.trim().to_string();
                trace!(name = %name, line = line_no, "Breakline");
                parsed.breaklines.push(Breakline {
                    name,
                    line: line_no,
                    ..Default::default()
                });
                current = Current::Breakline(parsed.breaklines.len() - 1);
            }
            "Storage Area Is2D" => {
                if let Current::StorageArea(idx) = current {
                    parsed.storage_areas[idx].is_2d = parse_flag(value);
                }
            }
            "Storage Area Surface Line" | "Storage Area 2D Points" | "BreakLine Polyline" => {
                let pairs = match read_coordinate_block(&lines, &mut i, value, line_no) {
                    Ok(pairs) => pairs,
                    Err(e) => {
                        debug!(key = key, line = line_no, error = %e, "Skipping coordinate block");
                        errors.push(e);
                        continue;
                    }
                };
                match (key, current) {
                    ("Storage Area Surface Line", Current::StorageArea(idx)) => {
                        parsed.storage_areas[idx].perimeter = pairs;
                    }
                    ("Storage Area 2D Points", Current::StorageArea(idx)) => {
                        parsed.storage_areas[idx].points = pairs;
                    }
                    ("BreakLine Polyline", Current::Breakline(idx)) => {
                        parsed.breaklines[idx].polyline = pairs;
                    }
                    _ => {
                        errors.push(GeometryError::parse_error(
                            line_no,
                            format!("'{}' outside of its parent record", key),
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    parsed
}

/// Découpe une ligne `Clé=Valeur`
fn split_record(line: &str) -> Option<(&str, &str)> {
    let pos = memchr(b'=', line.as_bytes())?;
    Some((line[..pos].trim(), &line[pos + 1..]))
}

/// Les booléens HEC-RAS valent `-1` (vrai) ou `0` (faux)
fn parse_flag(value: &str) -> bool {
    value.trim().parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

fn read_coordinate_block(
    lines: &[&str],
    cursor: &mut usize,
    count_value: &str,
    line_no: usize,
) -> Result<Vec<(f64, f64)>, GeometryError> {
    let count = parse_count(count_value, line_no)?;
    match read_pairs(lines, *cursor, count) {
        Ok((pairs, next)) => {
            *cursor = next;
            Ok(pairs)
        }
        Err(e) => {
            // Avancer jusqu'au prochain enregistrement pour ne pas relire le bloc
            while *cursor < lines.len() && !lines[*cursor].contains('=') {
                *cursor += 1;
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Geom Title=Site A\n\
Program Version=6.10\n\
Storage Area=Perimeter 1     ,1000,2000\n\
Storage Area Surface Line= 4\n\
             0.0             0.0           100.0             0.0\n\
           100.0           100.0             0.0           100.0\n\
Storage Area Type= 0\n\
Storage Area Is2D=-1\n\
Storage Area 2D Points= 2\n\
            25.0            25.0            75.0            75.0\n\
Storage Area=Pond,50,50\n\
Storage Area Surface Line= 3\n\
            10.0            10.0            20.0            10.0\n\
            20.0            20.0\n\
Storage Area Is2D=0\n\
BreakLine Name=Levee 1\n\
BreakLine CellSize Min=\n\
BreakLine Polyline= 2\n\
             5.0             5.0            95.0            95.0\n";

    #[test]
    fn test_parse_sample() {
        let mut errors = Vec::new();
        let parsed = parse(SAMPLE, &mut errors);

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert_eq!(parsed.title.as_deref(), Some("Site A"));
        assert_eq!(parsed.program_version.as_deref(), Some("6.10"));
        assert_eq!(parsed.storage_areas.len(), 2);

        let perimeter = &parsed.storage_areas[0];
        assert_eq!(perimeter.name, "Perimeter 1");
        assert!(perimeter.is_2d);
        assert_eq!(perimeter.perimeter.len(), 4);
        assert_eq!(perimeter.points, vec![(25.0, 25.0), (75.0, 75.0)]);

        let pond = &parsed.storage_areas[1];
        assert_eq!(pond.name, "Pond");
        assert!(!pond.is_2d);
        assert_eq!(pond.perimeter.len(), 3);

        assert_eq!(parsed.breaklines.len(), 1);
        assert_eq!(parsed.breaklines[0].name, "Levee 1");
        assert_eq!(parsed.breaklines[0].polyline, vec![(5.0, 5.0), (95.0, 95.0)]);
    }

    #[test]
    fn test_truncated_block_is_non_fatal() {
        let content = "Geom Title=T\n\
BreakLine Name=Broken\n\
BreakLine Polyline= 3\n\
             1.0             1.0\n\
BreakLine Name=Fine\n\
BreakLine Polyline= 1\n\
             2.0             2.0\n";
        let mut errors = Vec::new();
        let parsed = parse(content, &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(parsed.breaklines.len(), 2);
        assert!(parsed.breaklines[0].polyline.is_empty());
        assert_eq!(parsed.breaklines[1].polyline, vec![(2.0, 2.0)]);
    }

    #[test]
    fn test_huge_count_is_non_fatal() {
        let content = "Geom Title=T\n\
BreakLine Name=X\n\
BreakLine Polyline= 999999999999999\n\
 1.0 2.0\n\
BreakLine Name=Fine\n\
BreakLine Polyline= 1\n\
             2.0             2.0\n";
        let mut errors = Vec::new();
        let parsed = parse(content, &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(parsed.breaklines.len(), 2);
        assert!(parsed.breaklines[0].polyline.is_empty());
        assert_eq!(parsed.breaklines[1].polyline, vec![(2.0, 2.0)]);
    }

    #[test]
    fn test_orphan_polyline_is_reported() {
        let content = "Geom Title=T\n\
BreakLine Polyline= 1\n\
             2.0             2.0\n";
        let mut errors = Vec::new();
        let parsed = parse(content, &mut errors);

        assert!(parsed.breaklines.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("outside of its parent record"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("-1"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
