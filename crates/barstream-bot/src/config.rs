//! Application configuration.
//!
//! Every field has a default, so the service runs without a config file.
//! The flush threshold and output format are fixed and not configurable.

use crate::error::{AppError, AppResult};
use barstream_feed::{DEFAULT_API_KEY_ENV, DEFAULT_WS_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Polygon crypto WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Environment variable holding the Polygon API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Output directory for daily CSV files. Default: "data".
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Fixed delay before reconnecting (ms). Default: 5,000.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_key_env: default_api_key_env(),
            data_dir: default_data_dir(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "ws_url must be a ws:// or wss:// URL, got {}",
                self.ws_url
            )));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(AppError::Config("api_key_env must not be empty".to_string()));
        }
        if self.data_dir.trim().is_empty() {
            return Err(AppError::Config("data_dir must not be empty".to_string()));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "reconnect_delay_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
