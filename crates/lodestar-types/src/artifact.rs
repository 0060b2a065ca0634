//! Artifact types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A link or resource attached to an engagement.
///
/// `id` is assigned by the store and never leaves the process; `uuid` is the
/// client-visible identifier. `created` and `modified` are stamped by the
/// engine and overwrite whatever a client sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub engagement_uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub artifact_type: String,
    #[serde(default)]
    pub link_address: String,
    #[serde(
        default,
        with = "crate::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "crate::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified: Option<DateTime<Utc>>,
}

/// A required artifact field was blank
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} must not be blank")]
pub struct ValidationError {
    pub field: &'static str,
}

impl Artifact {
    /// Check the fields every persisted artifact must carry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("engagementUuid", &self.engagement_uuid),
            ("title", &self.title),
            ("description", &self.description),
            ("type", &self.artifact_type),
            ("linkAddress", &self.link_address),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ValidationError { field: *field }),
            None => Ok(()),
        }
    }

    /// The uuid, if one is set and non-blank.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Composite engagement file shape; only the fields the engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// Count response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCount {
    pub count: u64,
}

/// Outcome of reconciling a single submitted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModifyType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ModifyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModifyType::Create => write!(f, "CREATE"),
            ModifyType::Update => write!(f, "UPDATE"),
            ModifyType::Delete => write!(f, "DELETE"),
        }
    }
}
