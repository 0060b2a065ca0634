//! Query and author options passed from the resource layer into the engine.

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE: u32 = 0;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Treat `?engagementUuid=` the same as an absent parameter.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Paging parameters for artifact listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub engagement_uuid: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            engagement_uuid: None,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountOptions {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub engagement_uuid: Option<String>,
}

/// Commit author supplied by the client; unset fields fall back to the
/// configured bot identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorOptions {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub author_email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub author_name: Option<String>,
}
