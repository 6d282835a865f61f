/// Configuration management for the Linode API client
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.linode.com/v4";

/// Client configuration, usually loaded from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Linode personal access token (can also be set via LINODE_TOKEN env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// API root, including the version segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Age after which a volatile property read triggers a re-fetch
    #[serde(default = "default_volatile_refresh_secs")]
    pub volatile_refresh_secs: u64,

    /// Page size requested when walking collections
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("linode-objects/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_volatile_refresh_secs() -> u64 {
    15
}

fn default_page_size() -> u32 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            volatile_refresh_secs: default_volatile_refresh_secs(),
            page_size: default_page_size(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must be an http(s) URL: {}", self.base_url);
        }

        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }

        // The API rejects page sizes outside 25..=500
        if !(25..=500).contains(&self.page_size) {
            anyhow::bail!("page_size must be between 25 and 500, got {}", self.page_size);
        }

        Ok(())
    }

    /// Get the API token from config or environment
    pub fn get_token(&self) -> anyhow::Result<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("LINODE_TOKEN").ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Linode API token not found. Set LINODE_TOKEN environment variable or specify in config"
                )
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn volatile_refresh(&self) -> Duration {
        Duration::from_secs(self.volatile_refresh_secs)
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            token: Some("<personal access token>".to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::example();
        assert!(config.validate().is_ok());

        config.base_url = "ftp://api.linode.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = ClientConfig::default();
        config.page_size = 10;
        assert!(config.validate().is_err());
        config.page_size = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ClientConfig = serde_yaml::from_str("token: abc\n").unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.volatile_refresh(), Duration::from_secs(15));
    }

    #[test]
    fn test_explicit_token_wins() {
        let config = ClientConfig {
            token: Some("from-config".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(config.get_token().unwrap(), "from-config");
    }
}
