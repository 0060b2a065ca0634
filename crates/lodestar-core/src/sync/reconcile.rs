//! Reconcile-and-publish: apply a submitted artifact list to the store and
//! mirror each engagement's resulting list into its repository.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use futures::TryStreamExt;
use lodestar_types::{
    Artifact, AuthorOptions, ModifyType, RepositoryFile, ARTIFACT_FILE,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::pool::fan_out;
use super::report::{EngagementOutcome, ModifyCounts, ReconcileReport};
use super::SyncEngine;
use crate::format::encode_content;
use crate::{LodestarError, Result};

/// Reject the whole submission if any artifact is incomplete or a uuid
/// appears twice.
pub fn validate_submission(artifacts: &[Artifact]) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, artifact) in artifacts.iter().enumerate() {
        artifact
            .validate()
            .map_err(|e| LodestarError::Validation(format!("artifact {}: {}", index, e)))?;

        if let Some(uuid) = artifact.uuid() {
            if !seen.insert(uuid) {
                return Err(LodestarError::Validation(format!(
                    "artifact {}: uuid {} submitted more than once",
                    index, uuid
                )));
            }
        }
    }
    Ok(())
}

/// Reject a submission scoped to one engagement that carries another's
/// artifacts.
fn check_partition(engagement_uuid: &str, artifacts: &[Artifact]) -> Result<()> {
    match artifacts.iter().find(|a| a.engagement_uuid != engagement_uuid) {
        Some(stray) => Err(LodestarError::Validation(format!(
            "artifact for engagement {} submitted under {}",
            stray.engagement_uuid, engagement_uuid
        ))),
        None => Ok(()),
    }
}

impl SyncEngine {
    /// Reconcile `submitted` against the store, one engagement at a time,
    /// and publish every touched engagement's artifact file.
    ///
    /// Invalid submissions are rejected before anything is written. After
    /// that, each engagement succeeds or fails on its own and the report
    /// carries one outcome per engagement.
    pub async fn process_artifacts(
        &self,
        submitted: Vec<Artifact>,
        author: &AuthorOptions,
    ) -> Result<ReconcileReport> {
        validate_submission(&submitted)?;

        let mut partitions: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
        for artifact in submitted {
            partitions
                .entry(artifact.engagement_uuid.clone())
                .or_default()
                .push(artifact);
        }
        debug!(engagements = partitions.len(), "Reconciling submission");

        let outcomes = fan_out(
            partitions.into_iter().collect(),
            self.config.max_concurrency,
            |(engagement_uuid, artifacts): (String, Vec<Artifact>)| {
                self.outcome(engagement_uuid, artifacts, author)
            },
        )
        .await;

        Ok(ReconcileReport { outcomes })
    }

    /// Reconcile exactly one engagement, reporting it the same way as
    /// [`SyncEngine::process_artifacts`]. An empty submission clears the
    /// engagement.
    ///
    /// Invalid submissions, including artifacts owned by another
    /// engagement, are rejected before anything is written.
    pub async fn process_engagement(
        &self,
        engagement_uuid: &str,
        submitted: Vec<Artifact>,
        author: &AuthorOptions,
    ) -> Result<ReconcileReport> {
        validate_submission(&submitted)?;
        check_partition(engagement_uuid, &submitted)?;

        let outcome = self
            .outcome(engagement_uuid.to_string(), submitted, author)
            .await;
        Ok(ReconcileReport {
            outcomes: vec![outcome],
        })
    }

    async fn outcome(
        &self,
        engagement_uuid: String,
        artifacts: Vec<Artifact>,
        author: &AuthorOptions,
    ) -> EngagementOutcome {
        let result = self
            .reconcile_engagement(&engagement_uuid, artifacts, author)
            .await;
        if let Err(e) = &result {
            error!(engagement_uuid = %engagement_uuid, error = %e, "Failed to reconcile engagement");
        }
        EngagementOutcome {
            engagement_uuid,
            result,
        }
    }

    /// Make the store's artifacts for one engagement match `submitted`
    /// exactly, then publish the result. An empty submission deletes every
    /// artifact of the engagement and publishes an empty list.
    ///
    /// Store changes are committed before the repository write; a failed
    /// write leaves the two diverged until the next successful reconcile.
    #[instrument(skip(self, submitted, author), fields(submitted = submitted.len()))]
    pub async fn reconcile_engagement(
        &self,
        engagement_uuid: &str,
        submitted: Vec<Artifact>,
        author: &AuthorOptions,
    ) -> Result<ModifyCounts> {
        validate_submission(&submitted)?;
        check_partition(engagement_uuid, &submitted)?;

        // Resolve every uuid first so a conflict rejects the partition
        // before anything is written.
        let mut plan = Vec::with_capacity(submitted.len());
        for artifact in submitted {
            let persisted = match artifact.uuid() {
                Some(uuid) => self.store.find_by_uuid(uuid).await?,
                None => None,
            };
            if let Some(existing) = &persisted {
                if existing.engagement_uuid != engagement_uuid {
                    return Err(LodestarError::UuidConflict {
                        uuid: artifact.uuid().unwrap_or_default().to_string(),
                        owner: existing.engagement_uuid.clone(),
                    });
                }
            }
            plan.push((artifact, persisted));
        }

        let now = Utc::now();
        let mut counts = ModifyCounts::default();
        let mut kept = HashSet::new();

        for (mut artifact, persisted) in plan {
            let modify_type = match persisted {
                Some(existing) => {
                    artifact.id = existing.id;
                    artifact.created = existing.created;
                    artifact.modified = Some(now);
                    self.store.update(&artifact).await?;
                    ModifyType::Update
                }
                None => {
                    artifact.id = None;
                    artifact.uuid = Some(Uuid::new_v4().to_string());
                    artifact.created = Some(now);
                    artifact.modified = Some(now);
                    artifact = self.store.persist(&artifact).await?;
                    ModifyType::Create
                }
            };
            counts.record(modify_type);
            kept.extend(artifact.uuid);
        }

        let current: Vec<Artifact> = self
            .store
            .stream_by_engagement(engagement_uuid)
            .try_collect()
            .await?;
        for stale in current {
            let Some(uuid) = stale.uuid else { continue };
            if !kept.contains(&uuid) && self.store.delete_by_uuid(&uuid).await? {
                counts.record(ModifyType::Delete);
            }
        }

        info!(
            engagement_uuid,
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            "Artifacts reconciled"
        );

        let message = counts.commit_message(engagement_uuid);
        if let Err(e) = self.publish(engagement_uuid, &message, author).await {
            error!(
                engagement_uuid,
                error = %e,
                "Store updated but repository write failed; store and repository have diverged"
            );
            return Err(e);
        }

        Ok(counts)
    }

    /// Write the engagement's complete artifact list to its repository.
    async fn publish(
        &self,
        engagement_uuid: &str,
        commit_message: &str,
        author: &AuthorOptions,
    ) -> Result<()> {
        let artifacts: Vec<Artifact> = self
            .store
            .stream_by_engagement(engagement_uuid)
            .try_collect()
            .await?;
        let content = serde_json::to_string(&artifacts)?;

        let project = self
            .repository
            .find_project_for_engagement(self.config.group_parent_id, engagement_uuid)
            .await?;
        let tree = self
            .repository
            .list_tree(project.id, &self.config.default_branch, false)
            .await?;
        let is_update = tree.contains_path(ARTIFACT_FILE);

        let author_email = author
            .author_email
            .as_deref()
            .unwrap_or(&self.config.default_author_email);
        let author_name = author
            .author_name
            .as_deref()
            .unwrap_or(&self.config.default_author_name);
        let message = if commit_message.is_empty() {
            self.config.default_commit_message.as_str()
        } else {
            commit_message
        };

        let file = RepositoryFile::new(ARTIFACT_FILE)
            .with_branch(&self.config.default_branch)
            .with_author(author_email, author_name)
            .with_commit_message(message);
        let file = encode_content(file, &content);

        self.repository.write_file(project.id, &file, is_update).await?;
        info!(
            engagement_uuid,
            project_id = project.id,
            artifacts = artifacts.len(),
            is_update,
            "Published artifacts file"
        );
        Ok(())
    }
}
