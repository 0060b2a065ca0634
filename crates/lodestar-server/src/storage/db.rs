//! SQLite artifact store

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use lodestar_core::{Artifact, ArtifactStore, LodestarError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const COLUMNS: &str = "id, uuid, engagement_uuid, title, description, artifact_type, link_address, created, modified";

pub struct SqliteArtifactStore {
    pool: Arc<SqlitePool>,
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    uuid: String,
    engagement_uuid: String,
    title: String,
    description: String,
    artifact_type: String,
    link_address: String,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl From<ArtifactRow> for Artifact {
    fn from(row: ArtifactRow) -> Self {
        Artifact {
            id: Some(row.id),
            uuid: Some(row.uuid),
            engagement_uuid: row.engagement_uuid,
            title: row.title,
            description: row.description,
            artifact_type: row.artifact_type,
            link_address: row.link_address,
            created: row.created,
            modified: row.modified,
        }
    }
}

fn storage(e: sqlx::Error) -> LodestarError {
    LodestarError::Storage(e.to_string())
}

fn required_uuid(artifact: &Artifact) -> Result<&str> {
    artifact
        .uuid()
        .ok_or_else(|| LodestarError::Storage("artifact has no uuid".to_string()))
}

/// Insert or overwrite one record by uuid inside an open transaction.
async fn upsert(conn: &mut SqliteConnection, artifact: &Artifact) -> Result<()> {
    let uuid = required_uuid(artifact)?;
    sqlx::query(
        r#"
        INSERT INTO artifacts (id, uuid, engagement_uuid, title, description, artifact_type, link_address, created, modified)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(uuid) DO UPDATE SET
            engagement_uuid = excluded.engagement_uuid,
            title = excluded.title,
            description = excluded.description,
            artifact_type = excluded.artifact_type,
            link_address = excluded.link_address,
            created = excluded.created,
            modified = excluded.modified
        "#,
    )
    .bind(Uuid::new_v4().simple().to_string())
    .bind(uuid)
    .bind(&artifact.engagement_uuid)
    .bind(&artifact.title)
    .bind(&artifact.description)
    .bind(&artifact.artifact_type)
    .bind(&artifact.link_address)
    .bind(artifact.created)
    .bind(artifact.modified)
    .execute(conn)
    .await
    .map_err(storage)?;
    Ok(())
}

fn offset(page: u32, page_size: u32) -> i64 {
    i64::from(page) * i64::from(page_size)
}

impl SqliteArtifactStore {
    pub async fn new(database_path: &str) -> anyhow::Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                uuid TEXT NOT NULL UNIQUE,
                engagement_uuid TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                artifact_type TEXT NOT NULL,
                link_address TEXT NOT NULL,
                created TEXT,
                modified TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_artifacts_engagement
            ON artifacts (engagement_uuid)
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Artifact>> {
        let row = sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {} FROM artifacts WHERE uuid = ?",
            COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&*self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Artifact::from))
    }

    async fn persist(&self, artifact: &Artifact) -> Result<Artifact> {
        let uuid = required_uuid(artifact)?;
        let id = Uuid::new_v4().simple().to_string();

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, uuid, engagement_uuid, title, description, artifact_type, link_address, created, modified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(uuid)
        .bind(&artifact.engagement_uuid)
        .bind(&artifact.title)
        .bind(&artifact.description)
        .bind(&artifact.artifact_type)
        .bind(&artifact.link_address)
        .bind(artifact.created)
        .bind(artifact.modified)
        .execute(&*self.pool)
        .await
        .map_err(storage)?;

        Ok(Artifact {
            id: Some(id),
            ..artifact.clone()
        })
    }

    async fn update(&self, artifact: &Artifact) -> Result<()> {
        let id = artifact
            .id
            .as_deref()
            .ok_or_else(|| LodestarError::Storage("cannot update artifact without id".to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE artifacts
            SET engagement_uuid = ?, title = ?, description = ?, artifact_type = ?,
                link_address = ?, created = ?, modified = ?
            WHERE id = ?
            "#,
        )
        .bind(&artifact.engagement_uuid)
        .bind(&artifact.title)
        .bind(&artifact.description)
        .bind(&artifact.artifact_type)
        .bind(&artifact.link_address)
        .bind(artifact.created)
        .bind(artifact.modified)
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LodestarError::Storage(format!("artifact id {} not found", id)));
        }
        Ok(())
    }

    async fn delete_by_uuid(&self, uuid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM artifacts WHERE uuid = ?")
            .bind(uuid)
            .execute(&*self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM artifacts")
            .execute(&*self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }

    async fn bulk_persist(&self, artifacts: &[Artifact]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        for artifact in artifacts {
            upsert(&mut *tx, artifact).await?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(artifacts.len() as u64)
    }

    async fn replace_all(&self, artifacts: &[Artifact]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("DELETE FROM artifacts")
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        for artifact in artifacts {
            upsert(&mut *tx, artifact).await?;
        }

        // Dropping the transaction on error rolls the delete back
        tx.commit().await.map_err(storage)?;
        Ok(artifacts.len() as u64)
    }

    async fn count_all(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts")
            .fetch_one(&*self.pool)
            .await
            .map_err(storage)?;
        Ok(count as u64)
    }

    async fn count_by_engagement(&self, engagement_uuid: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE engagement_uuid = ?")
                .bind(engagement_uuid)
                .fetch_one(&*self.pool)
                .await
                .map_err(storage)?;
        Ok(count as u64)
    }

    async fn page_all(&self, page: u32, page_size: u32) -> Result<Vec<Artifact>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {} FROM artifacts ORDER BY rowid LIMIT ? OFFSET ?",
            COLUMNS
        ))
        .bind(i64::from(page_size))
        .bind(offset(page, page_size))
        .fetch_all(&*self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Artifact::from).collect())
    }

    async fn page_by_engagement(
        &self,
        engagement_uuid: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Artifact>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {} FROM artifacts WHERE engagement_uuid = ? ORDER BY rowid LIMIT ? OFFSET ?",
            COLUMNS
        ))
        .bind(engagement_uuid)
        .bind(i64::from(page_size))
        .bind(offset(page, page_size))
        .fetch_all(&*self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Artifact::from).collect())
    }

    fn stream_by_engagement<'a>(
        &'a self,
        engagement_uuid: &'a str,
    ) -> BoxStream<'a, Result<Artifact>> {
        const QUERY: &str = "SELECT id, uuid, engagement_uuid, title, description, artifact_type, link_address, created, modified \
             FROM artifacts WHERE engagement_uuid = ? ORDER BY rowid";

        sqlx::query_as::<_, ArtifactRow>(QUERY)
            .bind(engagement_uuid)
            .fetch(&*self.pool)
            .map(|row| row.map(Artifact::from).map_err(storage))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn store() -> (SqliteArtifactStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lodestar.db");
        let store = SqliteArtifactStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    fn artifact(uuid: &str, engagement: &str) -> Artifact {
        Artifact {
            uuid: Some(uuid.to_string()),
            engagement_uuid: engagement.to_string(),
            title: format!("title {}", uuid),
            description: "d".to_string(),
            artifact_type: "link".to_string(),
            link_address: "http://x".to_string(),
            created: Some(Utc::now()),
            modified: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_persist_find_and_update() {
        let (store, _dir) = store().await;
        let mut stored = store.persist(&artifact("u1", "e1")).await.unwrap();
        assert!(stored.id.is_some());

        stored.title = "renamed".to_string();
        store.update(&stored).await.unwrap();

        let found = store.find_by_uuid("u1").await.unwrap().unwrap();
        assert_eq!(found.title, "renamed");
        assert_eq!(found.id, stored.id);
        assert_eq!(found.created, stored.created);
        assert!(store.find_by_uuid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uuid_is_unique_across_engagements() {
        let (store, _dir) = store().await;
        store.persist(&artifact("u1", "e1")).await.unwrap();
        let err = store.persist(&artifact("u1", "e2")).await.unwrap_err();
        assert_eq!(err.code(), "storage");
    }

    #[tokio::test]
    async fn test_paging_preserves_insertion_order() {
        let (store, _dir) = store().await;
        for i in 0..5 {
            store.persist(&artifact(&format!("a{}", i), "e1")).await.unwrap();
        }
        store.persist(&artifact("b0", "e2")).await.unwrap();

        assert_eq!(store.count_all().await.unwrap(), 6);
        assert_eq!(store.count_by_engagement("e2").await.unwrap(), 1);

        let page = store.page_by_engagement("e1", 1, 2).await.unwrap();
        let uuids: Vec<_> = page.iter().filter_map(|a| a.uuid()).collect();
        assert_eq!(uuids, vec!["a2", "a3"]);

        let all = store.page_all(0, 20).await.unwrap();
        assert_eq!(all.last().unwrap().uuid(), Some("b0"));
    }

    #[tokio::test]
    async fn test_bulk_persist_upserts_and_stream_reads_partition() {
        let (store, _dir) = store().await;
        let original = store.persist(&artifact("u1", "e1")).await.unwrap();

        let mut refreshed = artifact("u1", "e1");
        refreshed.title = "refreshed".to_string();
        let inserted = store
            .bulk_persist(&[refreshed, artifact("u2", "e1"), artifact("u3", "e2")])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let e1: Vec<Artifact> = store.stream_by_engagement("e1").try_collect().await.unwrap();
        assert_eq!(e1.len(), 2);
        assert_eq!(e1[0].id, original.id);
        assert_eq!(e1[0].title, "refreshed");

        assert!(store.delete_by_uuid("u2").await.unwrap());
        assert!(!store.delete_by_uuid("u2").await.unwrap());
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_all_is_atomic() {
        let (store, _dir) = store().await;
        store.persist(&artifact("old", "e1")).await.unwrap();

        let mut missing_uuid = artifact("x", "e2");
        missing_uuid.uuid = None;
        let err = store
            .replace_all(&[artifact("u1", "e1"), missing_uuid])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "storage");
        assert!(store.find_by_uuid("old").await.unwrap().is_some());
        assert!(store.find_by_uuid("u1").await.unwrap().is_none());

        let replaced = store
            .replace_all(&[artifact("u1", "e1"), artifact("u2", "e2")])
            .await
            .unwrap();
        assert_eq!(replaced, 2);
        assert!(store.find_by_uuid("old").await.unwrap().is_none());
        assert_eq!(store.count_all().await.unwrap(), 2);
    }
}
