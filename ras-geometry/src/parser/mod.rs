//! Parsers bas niveau des fichiers de géométrie HEC-RAS

pub mod coords;
pub mod g01;
