//! Console transport - reads knob payloads from stdin and logs publishes
//!
//! Each non-empty input line is delivered as one message on the configured
//! topic. Lines are passed on as raw bytes, so undecodable input reaches the
//! dispatcher and is dropped there instead of ending the stream. Published payloads are written to the log instead of a broker,
//! which makes the bridge usable without a broker for testing and debugging.

use super::{InboundMessage, Transport};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type LineSource = Split<Box<dyn AsyncBufRead + Send + Unpin>>;

pub struct ConsoleTransport {
    topic: String,
    lines: Mutex<LineSource>,
    connected: AtomicBool,
    /// Publish counter for debugging
    publish_count: AtomicU64,
}

impl ConsoleTransport {
    /// Read messages from stdin
    pub fn stdin(topic: impl Into<String>) -> Self {
        Self::with_reader(topic, BufReader::new(tokio::io::stdin()))
    }

    /// Read messages from any buffered reader
    pub fn with_reader(
        topic: impl Into<String>,
        reader: impl AsyncBufRead + Send + Unpin + 'static,
    ) -> Self {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            topic: topic.into(),
            lines: Mutex::new(reader.split(b'\n')),
            connected: AtomicBool::new(false),
            publish_count: AtomicU64::new(0),
        }
    }

    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("🔌 Console transport listening on stdin as '{}'", self.topic);
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_segment().await {
                Ok(Some(line)) => {
                    let line = trim_line(&line);
                    if line.is_empty() {
                        continue;
                    }
                    return Some(InboundMessage {
                        topic: self.topic.clone(),
                        payload: Bytes::copy_from_slice(line),
                    });
                }
                Ok(None) => {
                    debug!("Console input closed");
                    return None;
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    return None;
                }
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            warn!("⚠️  Console transport not connected, skipping publish to {}", topic);
            return Ok(());
        }

        let count = self.publish_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "📤 [{}] {} ← {} [publish #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            topic,
            String::from_utf8_lossy(&payload),
            count
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(
                "🛑 Console transport shutting down (published {} messages)",
                self.publish_count()
            );
        }
        Ok(())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}
