//! Publish/subscribe transports that feed the knob service
//!
//! The service only needs "give me the next message" and "publish this
//! payload". Connection management, reconnects and wire delivery belong to
//! the transport implementation.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Message delivered by the transport on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Message handed to the transport for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Transport trait - all publish/subscribe integrations implement this
///
/// Note: All methods take &self (not &mut self) to support Arc<dyn Transport>.
/// Implementations should use interior mutability for mutable state.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging (e.g., "console", "channel")
    fn name(&self) -> &str;

    /// Connect and subscribe to the inbound topic
    async fn connect(&self) -> Result<()>;

    /// Wait for the next inbound message
    ///
    /// Returns None once the inbound stream has ended.
    async fn recv(&self) -> Option<InboundMessage>;

    /// Publish a payload on a topic
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Disconnect gracefully
    async fn shutdown(&self) -> Result<()>;
}

pub mod channel;
pub mod console;

pub use channel::{ChannelTransport, ChannelTransportHandle};
pub use console::ConsoleTransport;
