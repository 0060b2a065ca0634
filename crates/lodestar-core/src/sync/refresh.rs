//! Bulk refresh: rebuild the store from every project in the group.

use std::collections::HashSet;

use lodestar_types::Artifact;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::pool::fan_out;
use super::report::{ProjectFailure, RefreshReport};
use super::SyncEngine;
use crate::format::extract_artifacts;
use crate::{LodestarError, RefreshMode, Result};

impl SyncEngine {
    /// Rebuild the artifact store from the repositories.
    ///
    /// In [`RefreshMode::Staged`] every project is extracted before the
    /// store is touched, and any project failure aborts with
    /// [`LodestarError::RefreshAborted`] leaving the store as it was. The
    /// swap itself goes through [`crate::ArtifactStore::replace_all`]. In
    /// [`RefreshMode::Rebuild`] the store is emptied first; failed projects
    /// are reported and their artifacts stay missing until the next refresh.
    #[instrument(skip(self), fields(mode = ?self.config.refresh_mode))]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let mode = self.config.refresh_mode;

        if mode == RefreshMode::Rebuild {
            let removed = self.store.delete_all().await?;
            warn!(removed, "Deleted all artifacts ahead of rebuild");
        }

        let projects = self
            .repository
            .list_projects(self.config.group_parent_id, true)
            .await?;
        info!(projects = projects.len(), "Refreshing artifacts from projects");

        let project_ids: Vec<u64> = projects.iter().map(|p| p.id).collect();
        let extracted = fan_out(project_ids, self.config.max_concurrency, |project_id| async move {
            (project_id, self.extract_project(project_id).await)
        })
        .await;

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for (project_id, result) in extracted {
            match result {
                Ok(found) => artifacts.extend(found),
                Err(e) => {
                    error!(project_id, error = %e, "Failed to extract artifacts from project");
                    failures.push(ProjectFailure::new(project_id, &e));
                }
            }
        }

        if mode == RefreshMode::Staged && !failures.is_empty() {
            let failed = failures.iter().map(|f| f.project_id).collect();
            return Err(LodestarError::RefreshAborted(failed));
        }

        let artifacts = assign_uuids(artifacts);
        let inserted = match mode {
            RefreshMode::Staged => self.store.replace_all(&artifacts).await?,
            RefreshMode::Rebuild => self.store.bulk_persist(&artifacts).await?,
        };

        info!(
            projects = projects.len(),
            artifacts = inserted,
            failures = failures.len(),
            "Refresh complete"
        );

        Ok(RefreshReport {
            projects: projects.len(),
            artifacts: inserted,
            failures,
        })
    }

    async fn extract_project(&self, project_id: u64) -> Result<Vec<Artifact>> {
        let branch = &self.config.default_branch;
        let tree = self.repository.list_tree(project_id, branch, false).await?;
        let Some(node) = tree.artifacts_node() else {
            debug!(project_id, "No artifact file in project");
            return Ok(Vec::new());
        };

        let file = self
            .repository
            .read_file(project_id, &node.path, branch)
            .await?;
        let artifacts: Vec<Artifact> = extract_artifacts(file.as_ref())?
            .into_iter()
            .filter(|artifact| {
                let owned = !artifact.engagement_uuid.trim().is_empty();
                if !owned {
                    warn!(
                        project_id,
                        path = %node.path,
                        uuid = ?artifact.uuid(),
                        "Skipping artifact without an engagement uuid"
                    );
                }
                owned
            })
            .collect();
        debug!(project_id, path = %node.path, artifacts = artifacts.len(), "Parsed artifact file");
        Ok(artifacts)
    }
}

/// Give every artifact without a uuid a fresh one and keep only the first
/// occurrence of each uuid.
fn assign_uuids(artifacts: Vec<Artifact>) -> Vec<Artifact> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(artifacts.len());

    for mut artifact in artifacts {
        if artifact.uuid().is_none() {
            artifact.uuid = Some(Uuid::new_v4().to_string());
        }
        let uuid = artifact.uuid.clone().unwrap_or_default();
        if !seen.insert(uuid.clone()) {
            warn!(
                uuid = %uuid,
                engagement_uuid = %artifact.engagement_uuid,
                "Duplicate artifact uuid across repositories, keeping first"
            );
            continue;
        }
        artifact.id = None;
        kept.push(artifact);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepository;
    use crate::{ArtifactStore, MemoryArtifactStore, SyncConfig};
    use lodestar_types::{ARTIFACT_FILE, ENGAGEMENT_FILE};
    use std::sync::Arc;

    fn engine(
        mode: RefreshMode,
    ) -> (SyncEngine, Arc<MemoryArtifactStore>, Arc<FakeRepository>) {
        let store = Arc::new(MemoryArtifactStore::new());
        let repository = Arc::new(FakeRepository::new());
        let config = SyncConfig {
            group_parent_id: 1,
            refresh_mode: mode,
            max_concurrency: 2,
            ..Default::default()
        };
        let engine = SyncEngine::new(store.clone(), repository.clone(), config);
        (engine, store, repository)
    }

    fn seeded(mode: RefreshMode) -> (SyncEngine, Arc<MemoryArtifactStore>, Arc<FakeRepository>) {
        let (engine, store, repository) = engine(mode);
        repository.add_project(10, Some("e1"));
        repository.put_file(
            10,
            ARTIFACT_FILE,
            r#"[{"uuid":"u1","engagementUuid":"e1","title":"a","description":"d","type":"link","linkAddress":"http://a"},
                {"engagementUuid":"e1","title":"b","description":"d","type":"link","linkAddress":"http://b"}]"#,
        );
        repository.add_project(20, Some("e2"));
        repository.put_file(
            20,
            ENGAGEMENT_FILE,
            r#"{"uuid":"e2","artifacts":[{"uuid":"u3","title":"c","description":"d","type":"doc","linkAddress":"http://c"}]}"#,
        );
        repository.add_project(30, None);
        repository.put_file(30, "README.md", "hello");
        (engine, store, repository)
    }

    async fn stale(store: &MemoryArtifactStore) {
        store
            .persist(&Artifact {
                uuid: Some("stale".to_string()),
                engagement_uuid: "old".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_replaces_store_contents() {
        let (engine, store, _repository) = seeded(RefreshMode::Staged);
        stale(&store).await;

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.projects, 3);
        assert_eq!(report.artifacts, 3);
        assert!(report.failures.is_empty());

        assert!(store.find_by_uuid("stale").await.unwrap().is_none());
        assert_eq!(store.count_by_engagement("e1").await.unwrap(), 2);
        let composite = store.find_by_uuid("u3").await.unwrap().unwrap();
        assert_eq!(composite.engagement_uuid, "e2");
        assert!(store.all().await.iter().all(|a| a.uuid().is_some()));
    }

    #[tokio::test]
    async fn test_flat_file_wins_over_engagement_file() {
        let (engine, store, repository) = engine(RefreshMode::Staged);
        repository.add_project(1, Some("e1"));
        repository.put_file(1, ARTIFACT_FILE, r#"[{"uuid":"flat","engagementUuid":"e1"}]"#);
        repository.put_file(
            1,
            ENGAGEMENT_FILE,
            r#"{"uuid":"e1","artifacts":[{"uuid":"composite"}]}"#,
        );

        engine.refresh().await.unwrap();
        assert!(store.find_by_uuid("flat").await.unwrap().is_some());
        assert!(store.find_by_uuid("composite").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_staged_failure_leaves_store_untouched() {
        let (engine, store, repository) = seeded(RefreshMode::Staged);
        stale(&store).await;
        repository.fail_tree(20);

        let err = engine.refresh().await.unwrap_err();
        assert!(matches!(err, LodestarError::RefreshAborted(ref ids) if ids == &vec![20]));
        assert_eq!(store.count_all().await.unwrap(), 1);
        assert!(store.find_by_uuid("stale").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_file_fails_only_that_project_in_rebuild() {
        let (engine, store, repository) = seeded(RefreshMode::Rebuild);
        stale(&store).await;
        repository.put_file(20, ENGAGEMENT_FILE, "{broken");

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].project_id, 20);
        assert_eq!(report.failures[0].code, "malformed_content");

        // Rebuild deletes up front, so the failed project's data is gone.
        assert_eq!(store.count_all().await.unwrap(), 2);
        assert!(store.find_by_uuid("stale").await.unwrap().is_none());
        assert_eq!(store.count_by_engagement("e2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_engagement_file_without_uuid_fails_project() {
        let (engine, store, repository) = seeded(RefreshMode::Staged);
        stale(&store).await;
        repository.put_file(20, ENGAGEMENT_FILE, r#"{"artifacts":[{"uuid":"u3","title":"c"}]}"#);

        let err = engine.refresh().await.unwrap_err();
        assert!(matches!(err, LodestarError::RefreshAborted(ref ids) if ids == &vec![20]));
        assert!(store.find_by_uuid("stale").await.unwrap().is_some());

        let (engine, store, repository) = seeded(RefreshMode::Rebuild);
        repository.put_file(20, ENGAGEMENT_FILE, r#"{"uuid":"","artifacts":[{"uuid":"u3"}]}"#);

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].project_id, 20);
        assert_eq!(report.failures[0].code, "malformed_content");
        assert!(store.find_by_uuid("u3").await.unwrap().is_none());
        assert!(store.all().await.iter().all(|a| !a.engagement_uuid.is_empty()));
    }

    #[tokio::test]
    async fn test_flat_entries_without_owner_are_skipped() {
        let (engine, store, repository) = engine(RefreshMode::Staged);
        repository.add_project(1, Some("e1"));
        repository.put_file(
            1,
            ARTIFACT_FILE,
            r#"[{"uuid":"owned","engagementUuid":"e1"},
                {"uuid":"blank","engagementUuid":"  "},
                {"uuid":"missing"}]"#,
        );

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.artifacts, 1);
        assert!(report.failures.is_empty());
        assert!(store.find_by_uuid("owned").await.unwrap().is_some());
        assert!(store.find_by_uuid("blank").await.unwrap().is_none());
        assert!(store.find_by_uuid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_uuid_keeps_first_project() {
        let (engine, store, repository) = engine(RefreshMode::Staged);
        repository.add_project(1, Some("e1"));
        repository.put_file(1, ARTIFACT_FILE, r#"[{"uuid":"dup","engagementUuid":"e1"}]"#);
        repository.add_project(2, Some("e2"));
        repository.put_file(2, ARTIFACT_FILE, r#"[{"uuid":"dup","engagementUuid":"e2"}]"#);

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.artifacts, 1);
        let kept = store.find_by_uuid("dup").await.unwrap().unwrap();
        assert_eq!(kept.engagement_uuid, "e1");
    }
}
