//! Knob service - the transport-facing loop around the dispatcher
//!
//! Receives knob messages from a [`Transport`], dispatches them into the
//! shared [`StateStore`], and decides when to report the aggregated state
//! to the dimmer:
//! - after every `report.every_messages` inbound messages
//! - on every `report.interval_ms` tick
//! - once more on shutdown, so pending changes are not lost
//!
//! Reports are coalesced through the store's dirty flag: with
//! `only_when_dirty` set, a cycle with no intervening mutation publishes
//! nothing.

use crate::config::{AppConfig, ConfigWatcher, LogConfig, ReportConfig};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::logfile::truncate_log_file;
use crate::report::LightCommandEncoder;
use crate::state::{StateReport, StateStore};
use crate::transport::{InboundMessage, Transport};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub struct KnobService {
    dispatcher: Dispatcher,
    encoder: LightCommandEncoder,
    publish_topic: String,
    report: ReportConfig,
    log: LogConfig,
    messages_since_report: u64,
    messages_since_truncate: u64,
}

impl KnobService {
    /// Build a service with a fresh store sized from the config
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(StateStore::with_lock_timeout(config.store.lock_timeout()));
        Self::with_store(config, store)
    }

    /// Build a service around an existing store
    pub fn with_store(config: &AppConfig, store: Arc<StateStore>) -> Self {
        Self {
            dispatcher: Dispatcher::new(store),
            encoder: LightCommandEncoder::new(
                config.transport.client_id.clone(),
                config.report.light_id,
            ),
            publish_topic: config.transport.publish_topic.clone(),
            report: config.report.clone(),
            log: config.log.clone(),
            messages_since_report: 0,
            messages_since_truncate: 0,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        self.dispatcher.store()
    }

    /// Swap in report and log maintenance settings from a reloaded config
    pub fn apply_config(&mut self, config: &AppConfig) {
        if self.report.light_id != config.report.light_id
            || self.publish_topic != config.transport.publish_topic
        {
            info!(
                "Reporting to {} (light {})",
                config.transport.publish_topic, config.report.light_id
            );
        }
        self.encoder
            .reconfigure(config.transport.client_id.clone(), config.report.light_id);
        self.publish_topic = config.transport.publish_topic.clone();
        self.report = config.report.clone();
        self.log = config.log.clone();
        self.messages_since_report = 0;
    }

    /// Dispatch one inbound message and run any count-triggered maintenance
    pub async fn handle_message(
        &mut self,
        message: InboundMessage,
        transport: &dyn Transport,
    ) -> Option<DispatchOutcome> {
        debug!(
            "Received message on topic: {} with payload: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );

        // Store operations may block up to the lock timeout
        let dispatcher = self.dispatcher.clone();
        let payload = message.payload;
        let outcome = match tokio::task::spawn_blocking(move || dispatcher.dispatch(&payload)).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Dispatch task failed: {}", e);
                None
            }
        };

        self.messages_since_report += 1;
        if let Some(every) = self.report.every_messages {
            if self.messages_since_report >= every {
                self.messages_since_report = 0;
                self.report_cycle(transport).await;
            }
        }

        self.messages_since_truncate += 1;
        if self.messages_since_truncate >= self.log.truncate_interval {
            self.messages_since_truncate = 0;
            self.maintain_log_file().await;
        }

        outcome
    }

    /// Report the current state and publish it as a light command.
    ///
    /// Returns the published snapshot, or None when nothing was published
    /// (state clean, lock timeout, or publish failure).
    pub async fn report_cycle(&self, transport: &dyn Transport) -> Option<StateReport> {
        let store = Arc::clone(self.store());
        let only_when_dirty = self.report.only_when_dirty;

        let result = tokio::task::spawn_blocking(move || {
            if only_when_dirty {
                store.report_if_dirty()
            } else {
                store.report().map(Some)
            }
        })
        .await;

        let report = match result {
            Ok(Ok(Some(report))) => report,
            Ok(Ok(None)) => {
                debug!("State unchanged since last report, skipping publish");
                return None;
            }
            Ok(Err(e)) => {
                warn!("Skipping report: {}", e);
                return None;
            }
            Err(e) => {
                error!("Report task failed: {}", e);
                return None;
            }
        };

        info!("{}", report);

        let payload = match self.encoder.encode(report) {
            Ok(payload) => payload,
            Err(e) => {
                error!("{:#}", e);
                return None;
            }
        };

        match transport.publish(&self.publish_topic, payload).await {
            Ok(()) => Some(report),
            Err(e) => {
                error!("Failed to publish light command: {:#}", e);
                None
            }
        }
    }

    async fn maintain_log_file(&self) {
        if let Some(path) = &self.log.file {
            if let Err(e) = truncate_log_file(path, self.log.max_lines).await {
                error!("Error truncating log file: {:#}", e);
            }
        }
    }

    /// Run until the inbound stream ends or `shutdown` resolves
    pub async fn run(
        mut self,
        transport: &dyn Transport,
        mut config_watcher: Option<ConfigWatcher>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        transport.connect().await?;
        info!("✅ Transport '{}' connected", transport.name());

        let mut ticker = self.report.interval().map(report_ticker);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                message = transport.recv() => {
                    match message {
                        Some(message) => {
                            self.handle_message(message, transport).await;
                        }
                        None => {
                            info!("Inbound stream closed, stopping event loop");
                            break;
                        }
                    }
                }

                _ = next_tick(&mut ticker) => {
                    self.report_cycle(transport).await;
                }

                Some(new_config) = next_config(&mut config_watcher) => {
                    info!("📝 Configuration file changed, applying report settings");
                    let interval_changed = new_config.report.interval_ms != self.report.interval_ms;
                    self.apply_config(&new_config);
                    if interval_changed {
                        ticker = self.report.interval().map(report_ticker);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping event loop");
                    break;
                }
            }
        }

        // Flush anything that changed since the last report
        self.report_cycle(transport).await;

        transport.shutdown().await?;
        Ok(())
    }
}

fn report_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}
