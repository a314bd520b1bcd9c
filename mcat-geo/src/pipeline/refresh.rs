//! Rafraîchissement du cache pour une classe de features

use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, warn};

use ras_geometry::{ByClass, FeatureClass};

use crate::config::CacheCatalog;
use crate::error::PipelineError;
use crate::export::postgres::FeatureCache;
use crate::pipeline::filter::class_slice;
use crate::pipeline::source::FeatureRecord;
use crate::report::ClassOutcome;

/// Classes rafraîchies, dans l'ordre
pub const REFRESH_CLASSES: [FeatureClass; 3] = [
    FeatureClass::Breakline,
    FeatureClass::Mesh,
    FeatureClass::TwoDArea,
];

/// Étapes d'un rafraîchissement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Fetching,
    Filtering,
    /// Index de la feature en cours
    Upserting(usize),
    Done,
    Failed,
}

/// Écrit une classe de features dans le cache
pub struct ClassRefresher<'a> {
    cache: &'a dyn FeatureCache,
    catalog: &'a CacheCatalog,
    source_file: &'a str,
    class: FeatureClass,
    state: RefreshState,
    upserted: usize,
    skipped: usize,
}

impl<'a> ClassRefresher<'a> {
    pub fn new(
        cache: &'a dyn FeatureCache,
        catalog: &'a CacheCatalog,
        source_file: &'a str,
        class: FeatureClass,
    ) -> Self {
        Self {
            cache,
            catalog,
            source_file,
            class,
            state: RefreshState::Fetching,
            upserted: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Attend la lecture des features de la source; l'état reste `Fetching`
    /// jusqu'à la fin de la lecture
    pub async fn fetch<T>(
        &mut self,
        fetch: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        self.state = RefreshState::Fetching;
        let result = fetch.await;
        if result.is_err() {
            self.state = RefreshState::Failed;
        }
        result
    }

    /// Upsert de chaque feature ayant une cible; s'arrête à la première erreur
    pub async fn run(&mut self, features: &ByClass<FeatureRecord>) -> Result<(), PipelineError> {
        self.state = RefreshState::Filtering;
        let records = class_slice(features, self.class);
        debug!(class = %self.class, count = records.len(), "Refreshing class");

        for (i, record) in records.iter().enumerate() {
            let Some(target) = self.catalog.target(self.class, &record.feature_name) else {
                debug!(feature = %record.feature_name, "No cache target, skipping");
                self.skipped += 1;
                continue;
            };

            self.state = RefreshState::Upserting(i);
            let result = self
                .cache
                .upsert(
                    &self.catalog.schema,
                    target,
                    self.source_file,
                    &record.feature_name,
                    &record.raw_geometry,
                )
                .await;

            if let Err(e) = result {
                self.state = RefreshState::Failed;
                return Err(PipelineError::CacheWrite {
                    procedure: format!("{}.{}", self.catalog.schema, target.procedure),
                    feature: record.feature_name.clone(),
                    reason: e.to_string(),
                });
            }
            self.upserted += 1;
        }

        self.state = RefreshState::Done;
        info!(
            class = %self.class,
            source = %self.source_file,
            upserted = self.upserted,
            skipped = self.skipped,
            "Class refreshed"
        );
        Ok(())
    }

    /// Résultat final, erreur éventuelle de `run` incluse
    pub fn into_outcome(self, result: Result<(), PipelineError>) -> ClassOutcome {
        let error = result.err().map(|e| {
            warn!(class = %self.class, source = %self.source_file, error = %e, "Class refresh failed");
            e.to_string()
        });
        let state = if error.is_some() {
            RefreshState::Failed
        } else {
            self.state
        };
        ClassOutcome {
            class: self.class.id().to_string(),
            upserted: self.upserted,
            skipped: self.skipped,
            state,
            error,
        }
    }
}
