use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitlabConfig {
    /// Instance root, e.g. `https://gitlab.example.com`
    pub base_url: String,
    /// Personal or project access token sent as `PRIVATE-TOKEN`
    pub token: String,
    pub request_timeout_secs: u64,
    /// Scope used for the engagement project search
    pub project_search_scope: String,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gitlab.com".to_string(),
            token: String::new(),
            request_timeout_secs: 30,
            project_search_scope: "projects".to_string(),
        }
    }
}
