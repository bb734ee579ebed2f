use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::session::FailurePolicy;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub session: SessionConfig,
    pub feed: FeedConfig,
    pub placement: PlacementConfig,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Game screen this session serves (e.g. "dragon-tiger")
    pub game_id: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlacementConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_reconnect_secs() -> u64 {
    5
}

fn default_timeout_ms() -> u64 {
    3000
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }
}

impl PlacementConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
