//! Repository hosting API

use async_trait::async_trait;
use lodestar_types::{Project, ProjectTree, RepositoryFile};

use crate::{LodestarError, Result};

/// Version-control hosting operations the engine needs
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Every project under a group, across all pages.
    async fn list_projects(&self, group_id: u64, include_subgroups: bool) -> Result<Vec<Project>>;

    /// The file tree of a project on `branch`, across all pages.
    async fn list_tree(&self, project_id: u64, branch: &str, recursive: bool)
        -> Result<ProjectTree>;

    /// Read a file; `None` when it does not exist.
    async fn read_file(
        &self,
        project_id: u64,
        path: &str,
        branch: &str,
    ) -> Result<Option<RepositoryFile>>;

    /// Create or update `file.file_path` in a single commit.
    async fn write_file(&self, project_id: u64, file: &RepositoryFile, is_update: bool)
        -> Result<()>;

    /// Server-side filtered project search within a group.
    async fn search_projects(&self, group_id: u64, engagement_uuid: &str) -> Result<Vec<Project>>;

    /// The single project backing an engagement. Zero or several matches is
    /// an error.
    async fn find_project_for_engagement(
        &self,
        group_id: u64,
        engagement_uuid: &str,
    ) -> Result<Project> {
        let mut matches = self.search_projects(group_id, engagement_uuid).await?;
        match matches.len() {
            0 => Err(LodestarError::ProjectNotFound(engagement_uuid.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(LodestarError::AmbiguousProject {
                engagement_uuid: engagement_uuid.to_string(),
                matches: n,
            }),
        }
    }
}
