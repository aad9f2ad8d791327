//! Client configuration.

use serde::{Deserialize, Serialize};

/// Endpoint of the public model repository.
pub const DEFAULT_ENDPOINT: &str = "https://repo.azureiotrepository.com";

const DEFAULT_USER_AGENT: &str = concat!("modelrepo-client/", env!("CARGO_PKG_VERSION"));

/// Where and how the client talks to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://repo.azureiotrepository.com`
    pub endpoint: String,
    /// Value of the `User-Agent` header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: std::env::var("MODELREPO_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create a config for an explicit base URL
    pub fn new(endpoint: &str) -> Self {
        ClientConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            user_agent: default_user_agent(),
        }
    }

    /// Create a config for a connection string's `HostName` (HTTPS)
    pub fn for_host(host_name: &str) -> Self {
        Self::new(&format!("https://{}", host_name))
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Full URL for a path such as `/Models`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_host_uses_https() {
        let config = ClientConfig::for_host("repo.example.com");
        assert_eq!(config.endpoint, "https://repo.example.com");
        assert_eq!(config.url("/Models"), "https://repo.example.com/Models");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ClientConfig::new("http://127.0.0.1:8080/");
        assert_eq!(config.url("/Models/Search"), "http://127.0.0.1:8080/Models/Search");
    }

    #[test]
    fn test_user_agent_defaults_when_missing() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint":"http://localhost:1"}"#).unwrap();
        assert!(config.user_agent.starts_with("modelrepo-client/"));
    }
}
