use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Redirect target for blocked navigations; the blocked domain is
    /// appended as a `blockedUrl` query parameter.
    #[serde(default = "default_warning_page")]
    pub warning_page: String,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub unblock: UnblockConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UnblockConfig {
    #[serde(default = "default_unblock_duration_ms")]
    pub default_duration_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Path of the synchronized-scope JSON file. In-memory when unset.
    #[serde(default)]
    pub sync_path: Option<String>,
    /// Path of the local-scope JSON file. In-memory when unset.
    #[serde(default)]
    pub local_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_api_port() -> u16 {
    8080
}
fn default_warning_page() -> String {
    "chrome-extension://safeshield/blocked.html".to_string()
}
fn default_feed_url() -> String {
    "https://openphish.com/feed.txt".to_string()
}
fn default_unblock_duration_ms() -> u64 {
    10 * 60 * 1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            warning_page: default_warning_page(),
            feed: FeedConfig::default(),
            unblock: UnblockConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
        }
    }
}

impl Default for UnblockConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_unblock_duration_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}
