//! Server configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use modelrepo_core::{ConnectionString, SharedAccessKey};
use serde::{Deserialize, Serialize};

use crate::store::AppState;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Development server settings, read from a JSON file.
///
/// ```json
/// {
///   "bind": "127.0.0.1:8080",
///   "connectionStrings": ["HostName=localhost;RepositoryId=team;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0"],
///   "seedDir": "./models"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// One connection string per private repository
    #[serde(default)]
    pub connection_strings: Vec<String>,
    /// Directory of JSON documents loaded into the public repository as published models
    #[serde(default)]
    pub seed_dir: Option<PathBuf>,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            connection_strings: Vec::new(),
            seed_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load from `MODELREPO_SERVER_CONFIG` if set, then apply `MODELREPO_BIND`
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("MODELREPO_SERVER_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        if let Ok(bind) = std::env::var("MODELREPO_BIND") {
            config.bind = bind;
        }
        Ok(config)
    }

    /// Signing keys for the configured private repositories.
    pub fn repository_keys(&self) -> Result<Vec<SharedAccessKey>> {
        self.connection_strings
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let cs = ConnectionString::parse(raw)
                    .with_context(|| format!("connectionStrings[{}]", i))?;
                SharedAccessKey::from_connection_string(&cs)
                    .with_context(|| format!("connectionStrings[{}]", i))
            })
            .collect()
    }
}

impl AppState {
    /// Builds state for a config: one key per private repository and the
    /// seed directory loaded into the public repository.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let state = AppState::new(config.repository_keys()?);

        if let Some(ref dir) = config.seed_dir {
            let mut store = state.write()?;
            let entries = std::fs::read_dir(dir)
                .with_context(|| format!("Failed to read seed directory {}", dir.display()))?;

            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let model = store
                    .insert_document(None, &contents, true)
                    .with_context(|| format!("Failed to seed {}", path.display()))?;
                tracing::debug!(model_id = %model.model_id, "seeded public model");
            }
            tracing::info!(models = store.len(None), "public repository seeded");
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_repository_keys_from_connection_strings() {
        let config = ServerConfig {
            connection_strings: vec![
                "HostName=localhost;RepositoryId=team;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0"
                    .to_string(),
            ],
            ..ServerConfig::default()
        };
        let keys = config.repository_keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].repository_id(), "team");
    }

    #[test]
    fn test_connection_string_without_key_is_rejected() {
        let config = ServerConfig {
            connection_strings: vec!["HostName=localhost;RepositoryId=team".to_string()],
            ..ServerConfig::default()
        };
        let err = config.repository_keys().unwrap_err();
        assert!(format!("{:#}", err).contains("connectionStrings[0]"));
    }

    #[test]
    fn test_missing_seed_dir_is_an_error() {
        let config = ServerConfig {
            seed_dir: Some(PathBuf::from("/nonexistent/modelrepo-seed")),
            ..ServerConfig::default()
        };
        assert!(AppState::from_config(&config).is_err());
    }
}
