//! In-process transport backed by tokio channels
//!
//! Used to embed the bridge behind another message source and to drive the
//! service from tests.

use super::{InboundMessage, OutboundMessage, Transport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Transport side, handed to the service
pub struct ChannelTransport {
    topic: String,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    connected: AtomicBool,
}

/// Peer side, used to inject knob messages and observe publishes
pub struct ChannelTransportHandle {
    topic: String,
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl ChannelTransport {
    /// Create a connected pair for the given inbound topic
    pub fn new(topic: impl Into<String>) -> (Self, ChannelTransportHandle) {
        let topic = topic.into();
        let (inbound_tx, inbound_rx) = mpsc::channel(1000);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            topic: topic.clone(),
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            connected: AtomicBool::new(false),
        };
        let handle = ChannelTransportHandle {
            topic,
            inbound_tx: Some(inbound_tx),
            outbound_rx,
        };

        (transport, handle)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        "channel"
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Channel transport subscribed to {}", self.topic);
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        self.inbound_rx.lock().await.recv().await
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(anyhow!("Channel transport is not connected"));
        }

        debug!("Publishing {} bytes to {}", payload.len(), topic);
        self.outbound_tx
            .send(OutboundMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| anyhow!("Channel transport peer dropped"))
    }

    async fn shutdown(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.inbound_rx.lock().await.close();
        info!("Channel transport shut down");
        Ok(())
    }
}

impl ChannelTransportHandle {
    /// Deliver a payload on the subscribed topic
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        let tx = self
            .inbound_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Inbound stream already closed"))?;

        tx.send(InboundMessage {
            topic: self.topic.clone(),
            payload: payload.into(),
        })
        .await
        .map_err(|_| anyhow!("Channel transport dropped"))
    }

    /// End the inbound stream; the transport's `recv` returns None once drained
    pub fn close_inbound(&mut self) {
        self.inbound_tx = None;
    }

    /// Wait for the next published message
    pub async fn next_published(&mut self) -> Option<OutboundMessage> {
        self.outbound_rx.recv().await
    }

    /// Take a published message if one is already queued
    pub fn try_published(&mut self) -> Option<OutboundMessage> {
        self.outbound_rx.try_recv().ok()
    }
}
