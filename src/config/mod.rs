use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{BeaconError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a hosted Beacon project: the project base URL and
/// the publishable anon key sent with every request.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub project_url: String,
    pub anon_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let config = Self {
            project_url: project_url.into(),
            anon_key: anon_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads `BEACON_PROJECT_URL` and `BEACON_ANON_KEY`, loading a `.env`
    /// file first when one exists (for development).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let project_url = std::env::var("BEACON_PROJECT_URL")
            .map_err(|_| BeaconError::Config("BEACON_PROJECT_URL is not set".to_string()))?;
        let anon_key = std::env::var("BEACON_ANON_KEY")
            .map_err(|_| BeaconError::Config("BEACON_ANON_KEY is not set".to_string()))?;
        let timeout_secs = std::env::var("BEACON_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let config = Self {
            project_url,
            anon_key,
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BeaconError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ClientConfig = toml::from_str(&content)
            .map_err(|e| BeaconError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.project_url.starts_with("http://") && !self.project_url.starts_with("https://") {
            return Err(BeaconError::Config(format!(
                "project_url must be an http(s) URL, got '{}'",
                self.project_url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(BeaconError::Config("anon_key must not be empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.project_url.trim_end_matches('/'), endpoint)
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.project_url.trim_end_matches('/'), table)
    }
}
