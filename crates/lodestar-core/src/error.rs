//! Error types for the Lodestar engine

use lodestar_types::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LodestarError>;

#[derive(Error, Debug)]
pub enum LodestarError {
    #[error("No project found for engagement {0}")]
    ProjectNotFound(String),

    #[error("Engagement {engagement_uuid} maps to {matches} projects")]
    AmbiguousProject {
        engagement_uuid: String,
        matches: usize,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Repository API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed content in {path}: {reason}")]
    MalformedContent { path: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Artifact {uuid} belongs to engagement {owner}")]
    UuidConflict { uuid: String, owner: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Refresh aborted, {} project(s) failed: {}", .0.len(), join_ids(.0))]
    RefreshAborted(Vec<u64>),

    #[error("Config error: {0}")]
    Config(String),
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LodestarError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LodestarError::ProjectNotFound(_) => "project_not_found",
            LodestarError::AmbiguousProject { .. } => "ambiguous_project",
            LodestarError::Transport(_) => "transport",
            LodestarError::Status { .. } => "remote_status",
            LodestarError::MalformedContent { .. } => "malformed_content",
            LodestarError::Validation(_) => "validation",
            LodestarError::UuidConflict { .. } => "uuid_conflict",
            LodestarError::Storage(_) => "storage",
            LodestarError::Serialization(_) => "serialization",
            LodestarError::RefreshAborted(_) => "refresh_aborted",
            LodestarError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for LodestarError {
    fn from(e: serde_json::Error) -> Self {
        LodestarError::Serialization(e.to_string())
    }
}

impl From<ValidationError> for LodestarError {
    fn from(e: ValidationError) -> Self {
        LodestarError::Validation(e.to_string())
    }
}
