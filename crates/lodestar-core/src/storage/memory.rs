//! In-memory artifact store (tests and `storage.backend = "memory"`)

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use lodestar_types::Artifact;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ArtifactStore, LodestarError, Result};

/// Artifacts held in insertion order behind a single lock
#[derive(Default)]
pub struct MemoryArtifactStore {
    records: RwLock<Vec<Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in insertion order
    pub async fn all(&self) -> Vec<Artifact> {
        self.records.read().await.clone()
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn upsert(records: &mut Vec<Artifact>, artifact: &Artifact) {
    let existing = artifact
        .uuid()
        .and_then(|uuid| records.iter().position(|a| a.uuid() == Some(uuid)));

    match existing {
        Some(index) => {
            let id = records[index].id.take();
            records[index] = Artifact {
                id,
                ..artifact.clone()
            };
        }
        None => records.push(Artifact {
            id: Some(new_id()),
            ..artifact.clone()
        }),
    }
}

fn page_of(records: impl Iterator<Item = Artifact>, page: u32, page_size: u32) -> Vec<Artifact> {
    let skip = page as usize * page_size as usize;
    records.skip(skip).take(page_size as usize).collect()
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Artifact>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|a| a.uuid() == Some(uuid)).cloned())
    }

    async fn persist(&self, artifact: &Artifact) -> Result<Artifact> {
        let mut records = self.records.write().await;
        if let Some(uuid) = artifact.uuid() {
            if records.iter().any(|a| a.uuid() == Some(uuid)) {
                return Err(LodestarError::Storage(format!(
                    "artifact {} already exists",
                    uuid
                )));
            }
        }

        let mut stored = artifact.clone();
        stored.id = Some(new_id());
        records.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, artifact: &Artifact) -> Result<()> {
        let id = artifact
            .id
            .as_deref()
            .ok_or_else(|| LodestarError::Storage("cannot update artifact without id".to_string()))?;

        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(id))
            .ok_or_else(|| LodestarError::Storage(format!("artifact id {} not found", id)))?;
        *slot = artifact.clone();
        Ok(())
    }

    async fn delete_by_uuid(&self, uuid: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|a| a.uuid() != Some(uuid));
        Ok(records.len() != before)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn bulk_persist(&self, artifacts: &[Artifact]) -> Result<u64> {
        let mut records = self.records.write().await;
        for artifact in artifacts {
            upsert(&mut records, artifact);
        }
        Ok(artifacts.len() as u64)
    }

    async fn replace_all(&self, artifacts: &[Artifact]) -> Result<u64> {
        let mut replacement = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            upsert(&mut replacement, artifact);
        }
        *self.records.write().await = replacement;
        Ok(artifacts.len() as u64)
    }

    async fn count_all(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn count_by_engagement(&self, engagement_uuid: &str) -> Result<u64> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|a| a.engagement_uuid == engagement_uuid)
            .count() as u64)
    }

    async fn page_all(&self, page: u32, page_size: u32) -> Result<Vec<Artifact>> {
        let records = self.records.read().await;
        Ok(page_of(records.iter().cloned(), page, page_size))
    }

    async fn page_by_engagement(
        &self,
        engagement_uuid: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Artifact>> {
        let records = self.records.read().await;
        let matching = records
            .iter()
            .filter(|a| a.engagement_uuid == engagement_uuid)
            .cloned();
        Ok(page_of(matching, page, page_size))
    }

    fn stream_by_engagement<'a>(
        &'a self,
        engagement_uuid: &'a str,
    ) -> BoxStream<'a, Result<Artifact>> {
        stream::once(async move {
            let records = self.records.read().await;
            let matching: Vec<Result<Artifact>> = records
                .iter()
                .filter(|a| a.engagement_uuid == engagement_uuid)
                .cloned()
                .map(Ok)
                .collect();
            stream::iter(matching)
        })
        .flatten()
        .boxed()
    }
}
