use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/generate";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Environment variable that overrides the configured endpoint.
pub const ENDPOINT_ENV: &str = "TEXTGEN_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    /// Unset means the HTTP client's own default (no overall deadline).
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `TEXTGEN_ENDPOINT` and then the command-line endpoint, in that order.
    pub fn with_overrides(mut self, env_endpoint: Option<String>, cli_endpoint: Option<String>) -> Self {
        if let Some(endpoint) = env_endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(endpoint) = cli_endpoint {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("Endpoint must use http or https, got: {}", url.scheme());
        }

        if self.max_new_tokens == 0 {
            bail!("max_new_tokens must be greater than zero");
        }

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be between 0 and 2, got: {}", self.temperature);
        }

        if self.request_timeout_secs == Some(0) {
            bail!("request_timeout_secs must be greater than zero (omit it for no timeout)");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("textgen-chat").join("config.json"))
    }
}
