//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::player::PlayerConfig;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ConnectionQuality {
    Fast,
    #[default]
    Normal,
    Slow,
    VerySlow,
    Custom,
}

impl ConnectionQuality {
    pub fn buffer_seconds(&self, custom: u32) -> u32 {
        match self {
            ConnectionQuality::Fast => 2,
            ConnectionQuality::Normal => 5,
            ConnectionQuality::Slow => 15,
            ConnectionQuality::VerySlow => 30,
            ConnectionQuality::Custom => custom,
        }
    }

    pub fn is_slow(&self) -> bool {
        matches!(self, ConnectionQuality::Slow | ConnectionQuality::VerySlow)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionQuality::Fast => "Fast",
            ConnectionQuality::Normal => "Normal",
            ConnectionQuality::Slow => "Slow",
            ConnectionQuality::VerySlow => "Very Slow",
            ConnectionQuality::Custom => "⚙️ Custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the portal API (`/api/getChannels`, `/api/getAds`, ...)
    #[serde(default)]
    pub portal_url: String,
    /// M3U playlist URL or path, used when no portal is configured
    #[serde(default)]
    pub playlist_url: String,
    #[serde(default)]
    pub external_player: String,
    #[serde(default = "default_buffer")]
    pub buffer_seconds: u32,
    #[serde(default)]
    pub connection_quality: ConnectionQuality,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_true")]
    pub hw_accel: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub pass_user_agent_to_player: bool,
    #[serde(default = "default_true")]
    pub ads_enabled: bool,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_page_size")]
    pub channels_per_page: usize,
    #[serde(default = "default_top_count")]
    pub top_watched_count: usize,
    #[serde(default = "default_minimize_delay")]
    pub minimize_delay_ms: u64,
}

fn default_buffer() -> u32 { 5 }
fn default_retry_attempts() -> u32 { 3 }
fn default_true() -> bool { true }
fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_page_size() -> usize { 50 }
fn default_top_count() -> usize { 5 }
fn default_minimize_delay() -> u64 { 300 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            portal_url: String::new(),
            playlist_url: String::new(),
            external_player: String::new(),
            buffer_seconds: 5,
            connection_quality: ConnectionQuality::Normal,
            retry_attempts: 3,
            hw_accel: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pass_user_agent_to_player: true,
            ads_enabled: true,
            dark_mode: true,
            channels_per_page: 50,
            top_watched_count: 5,
            minimize_delay_ms: 300,
        }
    }
}

/// Directory holding config.json and views.json
pub fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("litestream");
    fs::create_dir_all(&path).ok();
    path
}

impl AppConfig {
    fn config_path() -> PathBuf {
        config_dir().join("config.json")
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring unreadable config {}: {}", path.display(), e),
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Ok(content) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(&path, content) {
                log::warn!("Failed to save config to {}: {}", path.display(), e);
            }
        }
    }

    pub fn effective_buffer(&self) -> u32 {
        self.connection_quality.buffer_seconds(self.buffer_seconds)
    }

    pub fn minimize_delay(&self) -> Duration {
        Duration::from_millis(self.minimize_delay_ms)
    }

    /// Backend configuration derived from the player settings
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            command: if self.external_player.trim().is_empty() {
                "ffplay".to_string()
            } else {
                self.external_player.trim().to_string()
            },
            buffer_seconds: self.effective_buffer(),
            slow_connection: self.connection_quality.is_slow(),
            retry_attempts: self.retry_attempts,
            hw_accel: self.hw_accel,
            user_agent: self
                .pass_user_agent_to_player
                .then(|| self.user_agent.clone()),
        }
    }
}
