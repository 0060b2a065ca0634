//! Synchronization engine
//!
//! `SyncEngine` ties the artifact store to the repository hosting API. It
//! owns the two pipelines:
//!
//! * [`SyncEngine::refresh`] rebuilds the store from every project in the
//!   configured group.
//! * [`SyncEngine::process_artifacts`] reconciles a submitted artifact list
//!   against the store and publishes each engagement's full list back to its
//!   repository.

mod pool;
mod reconcile;
mod refresh;
mod report;

use std::sync::Arc;

use lodestar_types::{Artifact, ArtifactCount, CountOptions, ListOptions};
use tracing::debug;

use crate::{ArtifactStore, RepositoryClient, Result, SyncConfig};

pub use report::{EngagementOutcome, ModifyCounts, ProjectFailure, ReconcileReport, RefreshReport};

pub struct SyncEngine {
    store: Arc<dyn ArtifactStore>,
    repository: Arc<dyn RepositoryClient>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        repository: Arc<dyn RepositoryClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            repository,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// One page of artifacts, optionally scoped to an engagement
    pub async fn list_artifacts(&self, options: &ListOptions) -> Result<Vec<Artifact>> {
        debug!(?options, "Listing artifacts");
        match options.engagement_uuid.as_deref() {
            Some(engagement_uuid) => {
                self.store
                    .page_by_engagement(engagement_uuid, options.page, options.page_size)
                    .await
            }
            None => self.store.page_all(options.page, options.page_size).await,
        }
    }

    pub async fn count_artifacts(&self, options: &CountOptions) -> Result<ArtifactCount> {
        let count = match options.engagement_uuid.as_deref() {
            Some(engagement_uuid) => self.store.count_by_engagement(engagement_uuid).await?,
            None => self.store.count_all().await?,
        };
        Ok(ArtifactCount { count })
    }
}
