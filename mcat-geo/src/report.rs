//! Rapport de rafraîchissement du cache
//!
//! Chaque classe est rafraîchie indépendamment: le rapport collecte les
//! résultats par classe et en déduit un statut global.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::pipeline::refresh::RefreshState;

/// Statut global du rafraîchissement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshStatus {
    /// Toutes les classes ont abouti
    Success,
    /// Au moins une classe a échoué, au moins une a abouti
    PartialSuccess,
    /// Aucune classe n'a abouti
    Failed,
}

/// Résultat d'une classe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassOutcome {
    /// Identifiant de classe (`breakline`, `mesh`, `twodarea`)
    pub class: String,
    /// Features écrites dans le cache
    pub upserted: usize,
    /// Features sans cible dans le catalogue
    pub skipped: usize,
    /// État final
    pub state: RefreshState,
    /// Message d'erreur si la classe a échoué
    pub error: Option<String>,
}

impl ClassOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RefreshState::Done
    }
}

/// Rapport complet d'un rafraîchissement
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Clé S3 du fichier source
    pub source_file: String,
    pub projection: String,
    pub duration_secs: f64,
    pub status: RefreshStatus,
    pub classes: Vec<ClassOutcome>,
}

impl RefreshReport {
    pub fn new(source_file: &str, projection: &str) -> Self {
        Self {
            source_file: source_file.to_string(),
            projection: projection.to_string(),
            duration_secs: 0.0,
            status: RefreshStatus::Success,
            classes: Vec::new(),
        }
    }

    /// Enregistre le résultat d'une classe
    pub fn record(&mut self, outcome: ClassOutcome) {
        self.classes.push(outcome);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final à partir des classes
    pub fn finalize(&mut self) {
        let succeeded = self.classes.iter().filter(|c| c.is_success()).count();

        self.status = if succeeded == self.classes.len() {
            RefreshStatus::Success
        } else if succeeded > 0 {
            RefreshStatus::PartialSuccess
        } else {
            RefreshStatus::Failed
        };
    }

    pub fn total_upserted(&self) -> usize {
        self.classes.iter().map(|c| c.upserted).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("REFRESH REPORT - {}", self.source_file);
        println!("{}", "=".repeat(60));

        println!("\nProjection: {}", self.projection);
        println!("Status: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- BY CLASS ---");
        for outcome in &self.classes {
            println!(
                "  {}: {} upserted, {} skipped ({:?})",
                outcome.class, outcome.upserted, outcome.skipped, outcome.state
            );
            if let Some(error) = &outcome.error {
                println!("    error: {}", error);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let failed = self.classes.iter().filter(|c| !c.is_success()).count();
        format!(
            "{}: {} upserted, {} classes failed",
            self.source_file,
            self.total_upserted(),
            failed
        )
    }
}
