//! Repository hosting types: projects, file trees and files.

use serde::{Deserialize, Serialize};

/// Flat artifact list file
pub const ARTIFACT_FILE: &str = "artifacts.json";
/// Composite engagement file carrying an `artifacts` array
pub const ENGAGEMENT_FILE: &str = "engagement.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// One file or directory entry in a project's tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTreeNode {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    pub path: String,
    #[serde(default)]
    pub mode: String,
}

impl ProjectTreeNode {
    pub fn is_file(&self) -> bool {
        self.node_type.is_empty() || self.node_type == "blob"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTree {
    pub project_id: u64,
    pub nodes: Vec<ProjectTreeNode>,
}

impl ProjectTree {
    pub fn new(project_id: u64, nodes: Vec<ProjectTreeNode>) -> Self {
        Self { project_id, nodes }
    }

    fn file_named(&self, name: &str) -> Option<&ProjectTreeNode> {
        self.nodes
            .iter()
            .find(|node| node.is_file() && node.name == name)
    }

    /// The node holding this project's artifacts. The flat artifact file
    /// wins over the composite engagement file when both exist.
    pub fn artifacts_node(&self) -> Option<&ProjectTreeNode> {
        self.file_named(ARTIFACT_FILE)
            .or_else(|| self.file_named(ENGAGEMENT_FILE))
    }

    /// Whether the flat artifact file already exists at `path`.
    pub fn contains_path(&self, path: &str) -> bool {
        self.nodes.iter().any(|node| node.is_file() && node.path == path)
    }
}

/// A repository file as exchanged with the hosting API. `content` is
/// transport-encoded (base64) when `encoding` says so.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFile {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(
        default,
        alias = "ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl RepositoryFile {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_author(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.author_email = Some(email.into());
        self.author_name = Some(name.into());
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }
}
