//! Refresh and reconcile outcomes

use lodestar_types::ModifyType;
use serde::Serialize;

use crate::{LodestarError, Result};

/// Per-engagement tally of reconcile outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModifyCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl ModifyCounts {
    pub fn record(&mut self, modify_type: ModifyType) {
        match modify_type {
            ModifyType::Create => self.created += 1,
            ModifyType::Update => self.updated += 1,
            ModifyType::Delete => self.deleted += 1,
        }
    }

    pub fn get(&self, modify_type: ModifyType) -> u64 {
        match modify_type {
            ModifyType::Create => self.created,
            ModifyType::Update => self.updated,
            ModifyType::Delete => self.deleted,
        }
    }

    /// Commit message summarising the counts for one engagement
    pub fn commit_message(&self, engagement_uuid: &str) -> String {
        format!(
            "Artifacts modified for engagement '{}'\n\tCreated: {}\n\tUpdated: {}\n\tDeleted: {}",
            engagement_uuid, self.created, self.updated, self.deleted
        )
    }
}

#[derive(Debug)]
pub struct EngagementOutcome {
    pub engagement_uuid: String,
    pub result: Result<ModifyCounts>,
}

/// Result of a reconcile-and-publish call, one entry per engagement
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<EngagementOutcome>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &LodestarError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(e) => Some((o.engagement_uuid.as_str(), e)),
        })
    }

    pub fn counts_for(&self, engagement_uuid: &str) -> Option<&ModifyCounts> {
        self.outcomes
            .iter()
            .find(|o| o.engagement_uuid == engagement_uuid)
            .and_then(|o| o.result.as_ref().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFailure {
    pub project_id: u64,
    pub code: String,
    pub error: String,
}

impl ProjectFailure {
    pub fn new(project_id: u64, error: &LodestarError) -> Self {
        Self {
            project_id,
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }
}

/// Result of a bulk refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Projects listed under the group
    pub projects: usize,
    /// Artifacts written to the store
    pub artifacts: u64,
    pub failures: Vec<ProjectFailure>,
}
