//! Configuration management for the knob bridge
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Publish/subscribe transport settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Topic the knob publishes its events on
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Topic the dimmer listens on for light commands
    #[serde(default = "default_publish_topic")]
    pub publish_topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// State store settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

/// When and how state is reported downstream
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Report after this many inbound messages
    #[serde(default = "default_every_messages")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every_messages: Option<u64>,
    /// Report on a fixed timer
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Skip the publish when nothing changed since the last report
    #[serde(default = "default_true")]
    pub only_when_dirty: bool,
    /// Light channel addressed on the dimmer
    #[serde(default)]
    pub light_id: u32,
}

/// Log file maintenance settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Check the log file size every this many messages
    #[serde(default = "default_truncate_interval")]
    pub truncate_interval: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_port(),
            topic: default_topic(),
            publish_topic: default_publish_topic(),
            client_id: default_client_id(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            every_messages: default_every_messages(),
            interval_ms: None,
            only_when_dirty: default_true(),
            light_id: 0,
        }
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_lines: default_max_lines(),
            truncate_interval: default_truncate_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.transport.broker.is_empty() {
            anyhow::bail!("transport.broker cannot be empty");
        }
        if self.transport.topic.is_empty() {
            anyhow::bail!("transport.topic cannot be empty");
        }
        if self.transport.publish_topic.is_empty() {
            anyhow::bail!("transport.publish_topic cannot be empty");
        }

        if self.store.lock_timeout_ms == 0 {
            anyhow::bail!("store.lock_timeout_ms must be greater than 0");
        }

        if self.report.every_messages == Some(0) {
            anyhow::bail!("report.every_messages must be greater than 0");
        }
        if self.report.interval_ms == Some(0) {
            anyhow::bail!("report.interval_ms must be greater than 0");
        }

        if self.log.max_lines == 0 {
            anyhow::bail!("log.max_lines must be greater than 0");
        }
        if self.log.truncate_interval == 0 {
            anyhow::bail!("log.truncate_interval must be greater than 0");
        }

        Ok(())
    }
}

// Default value functions
fn default_broker() -> String { "localhost".to_string() }
fn default_port() -> u16 { 1883 }
fn default_topic() -> String { "zigbee2mqtt/Smart_Knob_1".to_string() }
fn default_publish_topic() -> String { "shellyplus010v/rpc".to_string() }
fn default_client_id() -> String { "knob-bridge".to_string() }
fn default_lock_timeout_ms() -> u64 { 2000 }
fn default_every_messages() -> Option<u64> { Some(1) }
fn default_true() -> bool { true }
fn default_max_lines() -> usize { 1000 }
fn default_truncate_interval() -> u64 { 1000 }
