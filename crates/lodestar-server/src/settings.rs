//! Process settings: `lodestar.toml` layered under `LODESTAR_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use lodestar_core::SyncConfig;
use lodestar_gitlab::GitlabConfig;
use serde::Deserialize;

const CONFIG_PATH_VAR: &str = "LODESTAR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "lodestar.toml";
const ENV_PREFIX: &str = "LODESTAR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub sync: SyncConfig,
    pub gitlab: GitlabConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    /// Run one bulk refresh before accepting requests
    pub refresh_on_startup: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            refresh_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_path: "data/lodestar.db".to_string(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Load from the config file named by `LODESTAR_CONFIG` (default
    /// `lodestar.toml`, optional) and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path, environment())
    }

    pub fn load_from(path: &Path, environment: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        if self.gitlab.base_url.trim().is_empty() {
            bail!("gitlab.base_url must not be empty");
        }
        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.database_path.trim().is_empty()
        {
            bail!("storage.database_path must be set for the sqlite backend");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_core::RefreshMode;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_file_and_environment_are_layered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lodestar.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind_address = "127.0.0.1:9000"

[sync]
group_parent_id = 12
refresh_mode = "rebuild"

[gitlab]
base_url = "https://gitlab.example.com"
token = "from-file"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(
            &path,
            env(&[
                ("LODESTAR_GITLAB__TOKEN", "from-env"),
                ("LODESTAR_SYNC__MAX_CONCURRENCY", "8"),
                ("LODESTAR_STORAGE__BACKEND", "memory"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.server.bind_address, "127.0.0.1:9000");
        assert_eq!(settings.sync.group_parent_id, 12);
        assert_eq!(settings.sync.refresh_mode, RefreshMode::Rebuild);
        assert_eq!(settings.sync.max_concurrency, 8);
        assert_eq!(settings.sync.default_branch, "master");
        assert_eq!(settings.gitlab.token, "from-env");
        assert_eq!(settings.gitlab.request_timeout_secs, 30);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_missing_file_uses_defaults_and_requires_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = Settings::load_from(&path, env(&[])).unwrap_err();
        assert!(err.to_string().contains("group_parent_id"));

        let settings =
            Settings::load_from(&path, env(&[("LODESTAR_SYNC__GROUP_PARENT_ID", "3")])).unwrap();
        assert_eq!(settings.server.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.storage.backend, StorageBackend::Sqlite);
    }
}
