//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::{LodestarError, Result};

/// How a bulk refresh treats the existing store contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Extract every project first; replace the store only if all succeeded.
    #[default]
    Staged,
    /// Delete everything up front, then insert whatever could be extracted.
    Rebuild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Group whose projects hold engagement repositories
    pub group_parent_id: u64,
    pub default_branch: String,
    pub default_commit_message: String,
    pub default_author_name: String,
    pub default_author_email: String,
    pub page_size: u32,
    /// Upper bound on concurrent remote calls during refresh and publish
    pub max_concurrency: usize,
    pub refresh_mode: RefreshMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            group_parent_id: 0,
            default_branch: "master".to_string(),
            default_commit_message: "updated artifacts list".to_string(),
            default_author_name: "lodestar-artifacts-bot".to_string(),
            default_author_email: "lodestar-backend-bot@bot.com".to_string(),
            page_size: 20,
            max_concurrency: 4,
            refresh_mode: RefreshMode::Staged,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.group_parent_id == 0 {
            return Err(LodestarError::Config(
                "sync.group_parent_id must be set".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(LodestarError::Config(
                "sync.page_size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(LodestarError::Config(
                "sync.max_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.default_branch.trim().is_empty() {
            return Err(LodestarError::Config(
                "sync.default_branch must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
