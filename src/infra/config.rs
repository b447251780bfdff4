// src/infra/config.rs — Configuration loading (TOML)
//
// The TOML file holds deployment-level settings: gateway credentials, fire
// schedules, the control API, and backoff ranges. Operator-mutable runtime
// settings (target profile, limits, toggles) live in the store instead so
// they can change without a restart.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Bearer token for the authenticated account. Absent means no session:
    /// cycles log the fact and abort cleanly.
    pub bearer_token: Option<String>,
    /// User id of the authenticated account (needed for follow/unfollow and
    /// reciprocity listing).
    pub account_id: Option<String>,
    /// Follower ids fetched per page.
    pub page_size: u32,
    /// User records resolved per lookup batch.
    pub batch_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com".into(),
            bearer_token: None,
            account_id: None,
            page_size: 1000,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Fire spec for the follow cycle: "daily HH:MM", "hourly" or "every Xm".
    pub follow: String,
    /// Fire spec for the unfollow cycle.
    pub unfollow: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            follow: "daily 10:00".into(),
            unfollow: "daily 11:00".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
    /// Optional bearer token required on every control-surface request.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8085,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Pause between follower pages, seconds.
    pub page_min_secs: u64,
    pub page_max_secs: u64,
    /// Pause after each successful follow/unfollow, seconds.
    pub action_min_secs: u64,
    pub action_max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            page_min_secs: 5,
            page_max_secs: 10,
            action_min_secs: 5,
            action_max_secs: 15,
        }
    }
}

impl Config {
    /// Load from the default config path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&paths::config_file_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }
}
