//! Scripted in-memory repository host for tests

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use lodestar_types::{Project, ProjectTree, ProjectTreeNode, RepositoryFile};

use crate::format::{decode_content, encode_content};
use crate::{LodestarError, RepositoryClient, Result};

#[derive(Debug, Clone)]
struct FakeProject {
    project: Project,
    engagement_uuid: Option<String>,
    /// path -> decoded content
    files: BTreeMap<String, String>,
}

/// A write the engine performed
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub project_id: u64,
    pub file: RepositoryFile,
    pub is_update: bool,
}

#[derive(Default)]
struct FakeState {
    projects: Vec<FakeProject>,
    writes: Vec<RecordedWrite>,
    failing_trees: HashSet<u64>,
    failing_writes: bool,
}

/// Repository host backed by plain maps. Projects are looked up by
/// engagement the same way the real search endpoint matches them.
#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<FakeState>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn add_project(&self, id: u64, engagement_uuid: Option<&str>) {
        self.with_state(|state| {
            state.projects.push(FakeProject {
                project: Project {
                    id,
                    name: format!("project-{}", id),
                    path_with_namespace: None,
                    description: None,
                    default_branch: None,
                },
                engagement_uuid: engagement_uuid.map(str::to_string),
                files: BTreeMap::new(),
            })
        });
    }

    pub fn put_file(&self, project_id: u64, path: &str, content: &str) {
        self.with_state(|state| {
            if let Some(project) = state.projects.iter_mut().find(|p| p.project.id == project_id) {
                project.files.insert(path.to_string(), content.to_string());
            }
        });
    }

    pub fn file(&self, project_id: u64, path: &str) -> Option<String> {
        self.with_state(|state| {
            state
                .projects
                .iter()
                .find(|p| p.project.id == project_id)
                .and_then(|p| p.files.get(path).cloned())
        })
    }

    /// Make `list_tree` fail for a project
    pub fn fail_tree(&self, project_id: u64) {
        self.with_state(|state| {
            state.failing_trees.insert(project_id);
        });
    }

    pub fn fail_writes(&self) {
        self.with_state(|state| state.failing_writes = true);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.with_state(|state| state.writes.clone())
    }
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn list_projects(&self, _group_id: u64, _include_subgroups: bool) -> Result<Vec<Project>> {
        Ok(self.with_state(|state| state.projects.iter().map(|p| p.project.clone()).collect()))
    }

    async fn list_tree(
        &self,
        project_id: u64,
        _branch: &str,
        _recursive: bool,
    ) -> Result<ProjectTree> {
        self.with_state(|state| {
            if state.failing_trees.contains(&project_id) {
                return Err(LodestarError::Transport(format!(
                    "tree listing for project {} timed out",
                    project_id
                )));
            }
            let project = state
                .projects
                .iter()
                .find(|p| p.project.id == project_id)
                .ok_or(LodestarError::Status {
                    status: 404,
                    url: format!("projects/{}/repository/tree", project_id),
                })?;
            let nodes = project
                .files
                .keys()
                .map(|path| ProjectTreeNode {
                    id: String::new(),
                    name: path.rsplit('/').next().unwrap_or(path).to_string(),
                    node_type: "blob".to_string(),
                    path: path.clone(),
                    mode: "100644".to_string(),
                })
                .collect();
            Ok(ProjectTree::new(project_id, nodes))
        })
    }

    async fn read_file(
        &self,
        project_id: u64,
        path: &str,
        branch: &str,
    ) -> Result<Option<RepositoryFile>> {
        Ok(self.file(project_id, path).map(|content| {
            encode_content(RepositoryFile::new(path).with_branch(branch), &content)
        }))
    }

    async fn write_file(&self, project_id: u64, file: &RepositoryFile, is_update: bool) -> Result<()> {
        let content = decode_content(file)?.unwrap_or_default();
        self.with_state(|state| {
            if state.failing_writes {
                return Err(LodestarError::Status {
                    status: 500,
                    url: format!("projects/{}/repository/files", project_id),
                });
            }
            let project = state
                .projects
                .iter_mut()
                .find(|p| p.project.id == project_id)
                .ok_or(LodestarError::Status {
                    status: 404,
                    url: format!("projects/{}", project_id),
                })?;
            let exists = project.files.contains_key(&file.file_path);
            if exists != is_update {
                return Err(LodestarError::Status {
                    status: 400,
                    url: format!("projects/{}/repository/files/{}", project_id, file.file_path),
                });
            }
            project.files.insert(file.file_path.clone(), content);
            state.writes.push(RecordedWrite {
                project_id,
                file: file.clone(),
                is_update,
            });
            Ok(())
        })
    }

    async fn search_projects(&self, _group_id: u64, engagement_uuid: &str) -> Result<Vec<Project>> {
        Ok(self.with_state(|state| {
            state
                .projects
                .iter()
                .filter(|p| p.engagement_uuid.as_deref() == Some(engagement_uuid))
                .map(|p| p.project.clone())
                .collect()
        }))
    }
}
