//! Lecture des blocs de coordonnées à largeur fixe

use crate::GeometryError;

/// Largeur d'un champ numérique dans les fichiers .g01
pub const FIELD_WIDTH: usize = 16;

/// Réservation maximale avant lecture: le compteur vient du fichier
const PREALLOC_VALUES: usize = 4096;

/// Lit `count` paires (x, y) à partir de `lines[start..]`.
///
/// Retourne les paires et l'index de la première ligne non consommée.
/// Les valeurs sont d'abord découpées par espaces; quand deux champs de
/// 16 caractères se touchent (grandes coordonnées), on relit la ligne par
/// tranches fixes.
pub fn read_pairs(
    lines: &[&str],
    start: usize,
    count: usize,
) -> Result<(Vec<(f64, f64)>, usize), GeometryError> {
    let wanted = count.checked_mul(2).ok_or_else(|| {
        GeometryError::parse_error(start, format!("coordinate count {} is out of range", count))
    })?;
    let mut values: Vec<f64> = Vec::with_capacity(wanted.min(PREALLOC_VALUES));
    let mut idx = start;

    while values.len() < wanted {
        let Some(line) = lines.get(idx) else {
            return Err(GeometryError::parse_error(
                idx + 1,
                format!(
                    "expected {} coordinate pairs, file ended after {}",
                    count,
                    values.len() / 2
                ),
            ));
        };
        if line.contains('=') {
            return Err(GeometryError::parse_error(
                idx + 1,
                format!(
                    "expected {} coordinate pairs, found {} before next record",
                    count,
                    values.len() / 2
                ),
            ));
        }

        parse_line(line, &mut values)
            .map_err(|reason| GeometryError::parse_error(idx + 1, reason))?;
        idx += 1;
    }

    // Une ligne peut porter plus de valeurs que nécessaire: on ignore le surplus
    values.truncate(wanted);
    let pairs = values.chunks_exact(2).map(|c| (c[0], c[1])).collect();
    Ok((pairs, idx))
}

/// Ajoute les valeurs numériques d'une ligne à `out`
fn parse_line(line: &str, out: &mut Vec<f64>) -> Result<(), String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(());
    }

    let before = out.len();
    let split_ok = line
        .split_whitespace()
        .try_for_each(|token| parse_number(token).map(|v| out.push(v)));
    if split_ok.is_ok() {
        return Ok(());
    }
    out.truncate(before);

    parse_fixed_width(line, out)
}

fn parse_fixed_width(line: &str, out: &mut Vec<f64>) -> Result<(), String> {
    if !line.is_ascii() {
        return Err("non-ascii coordinate line".to_string());
    }
    let bytes = line.as_bytes();
    for chunk in bytes.chunks(FIELD_WIDTH) {
        // Sûr: la ligne est ASCII, chaque tranche est une chaîne valide
        let field = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        out.push(parse_number(field)?);
    }
    Ok(())
}

fn parse_number(token: &str) -> Result<f64, String> {
    fast_float::parse::<f64, _>(token).map_err(|_| format!("invalid coordinate value '{}'", token))
}

/// Lit l'entier qui suit le `=` d'une ligne de compteur (`... Polyline= 12`)
pub fn parse_count(value: &str, line_no: usize) -> Result<usize, GeometryError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    // Certains compteurs sont suivis d'options séparées par des virgules
    let first = value.split(',').next().unwrap_or("").trim();
    first
        .parse::<usize>()
        .map_err(|_| GeometryError::parse_error(line_no, format!("invalid count '{}'", value)))
}
