use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub empresa_id: String,
    #[serde(default = "default_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_alerts_limit")]
    pub alerts_limit: u32,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default)]
    pub storage_keys: StorageKeys,
    #[serde(default = "default_watch_hardware")]
    pub watch_hardware: bool,
    pub slack_webhook_url: Option<String>,
}

fn default_interval() -> u64 {
    10
}

fn default_alerts_limit() -> u32 {
    10
}

fn default_state_file() -> String {
    "alerts-state.json".to_string()
}

fn default_watch_hardware() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageKeys {
    #[serde(default = "default_alerts_key")]
    pub alerts: String,
    #[serde(default = "default_hardware_key")]
    pub hardware: String,
}

fn default_alerts_key() -> String {
    "empresa_alerts_shown".to_string()
}

fn default_hardware_key() -> String {
    "empresa_hardware_shown".to_string()
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            alerts: default_alerts_key(),
            hardware: default_hardware_key(),
        }
    }
}

impl Config {
    /// Reads the JSON config at `path`, then applies `API_TOKEN` and
    /// `SLACK_WEBHOOK_URL` from the environment when set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&data)?;
        if let Ok(token) = std::env::var("API_TOKEN") {
            if !token.trim().is_empty() {
                config.api.token = Some(token);
            }
        }
        if let Ok(webhook) = std::env::var("SLACK_WEBHOOK_URL") {
            if !webhook.trim().is_empty() {
                config.slack_webhook_url = Some(webhook);
            }
        }
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if self.empresa_id.trim().is_empty() {
            return Err(ConfigError::Invalid("empresa_id must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
