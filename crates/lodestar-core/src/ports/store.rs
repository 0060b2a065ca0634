//! Artifact persistence

use async_trait::async_trait;
use futures::stream::BoxStream;
use lodestar_types::Artifact;

use crate::Result;

/// Document store holding artifacts, partitioned by engagement.
///
/// Implementations assign `id` on insert, keep exactly one record per
/// `uuid`, and return records in insertion order.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Artifact>>;

    /// Insert a new record and return it with its assigned id.
    async fn persist(&self, artifact: &Artifact) -> Result<Artifact>;

    /// Replace the record identified by `artifact.id`.
    async fn update(&self, artifact: &Artifact) -> Result<()>;

    async fn delete_by_uuid(&self, uuid: &str) -> Result<bool>;
    async fn delete_all(&self) -> Result<u64>;

    /// Insert many records at once, upserting by uuid.
    async fn bulk_persist(&self, artifacts: &[Artifact]) -> Result<u64>;

    /// Swap the whole store for `artifacts` in one step. Readers see either
    /// the old contents or the new ones, and a failure keeps the old ones.
    async fn replace_all(&self, artifacts: &[Artifact]) -> Result<u64>;

    async fn count_all(&self) -> Result<u64>;
    async fn count_by_engagement(&self, engagement_uuid: &str) -> Result<u64>;

    async fn page_all(&self, page: u32, page_size: u32) -> Result<Vec<Artifact>>;
    async fn page_by_engagement(
        &self,
        engagement_uuid: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Artifact>>;

    /// Lazily yield every record for one engagement. Each call starts a
    /// fresh sequence.
    fn stream_by_engagement<'a>(
        &'a self,
        engagement_uuid: &'a str,
    ) -> BoxStream<'a, Result<Artifact>>;
}
