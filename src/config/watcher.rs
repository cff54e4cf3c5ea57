//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Config watcher that monitors file changes and sends reload notifications
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Start watching an existing config file
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let (tx, rx) = mpsc::channel(10);

        let watched_path = config_path.clone();

        // notify callbacks run on their own OS thread, not in Tokio context
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_)) {
                        debug!("Config file modified: {:?}", event.paths);

                        let config_path = watched_path.clone();
                        let tx = tx.clone();

                        runtime_handle.spawn(async move {
                            // Debounce: wait a bit for file writes to complete
                            tokio::time::sleep(Duration::from_millis(100)).await;

                            match AppConfig::load(&config_path).await {
                                Ok(new_config) => {
                                    info!("Configuration reloaded successfully");
                                    if let Err(e) = tx.send(new_config).await {
                                        error!("Failed to send config update: {}", e);
                                    }
                                }
                                Err(e) => {
                                    warn!("Failed to reload config (keeping old config): {:#}", e);
                                }
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path.display()))?;

        info!("Config file watcher started for: {}", config_path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next config update
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}
