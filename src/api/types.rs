// src/api/types.rs

use serde::{Deserialize, Serialize};

use crate::engine::CycleReport;

/// Request body for updating runtime settings. Every field is optional; only
/// present fields are written.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsRequest {
    /// Profile URL of the account whose followers are mirrored.
    #[serde(default)]
    pub target_profile: Option<String>,
    #[serde(default)]
    pub daily_follow_limit: Option<u32>,
    /// Days to wait for reciprocity before unfollowing.
    #[serde(default)]
    pub unfollow_delay: Option<u32>,
    #[serde(default)]
    pub filter_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistRequest {
    pub screen_name: String,
}

/// Response for a manual cycle trigger.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub task: String,
    pub report: CycleReport,
}

/// Engine status: current settings plus store counts.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub bot_active: bool,
    pub target_profile: Option<String>,
    pub daily_follow_limit: String,
    pub unfollow_delay: String,
    pub filter_active: bool,
    pub followed_count: i64,
    pub whitelist_count: usize,
    pub session_present: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
