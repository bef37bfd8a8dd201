//! Broker Abstraction
//!
//! The relay talks to its message broker through the `Broker` trait. Inbound
//! traffic does not go through the trait: each broker hands out an unbounded
//! receiver of `BrokerMessage` when it is created, and the relay drains it.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Raw message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Namespaced broker channel name
    pub channel: String,
    /// Undecoded payload text
    pub payload: String,
}

/// Receiving half handed out by broker constructors.
pub type BrokerInbound = mpsc::UnboundedReceiver<BrokerMessage>;

/// Broker errors
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker unavailable")]
    Unavailable,

    #[error("Broker shut down")]
    Closed,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Publish/subscribe operations the relay needs from a broker.
///
/// Channel arguments are namespaced broker channel names.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Send `payload` to every subscriber of `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    /// Start receiving messages published on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError>;

    /// Stop receiving messages published on `channel`.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;

    /// Whether the broker is currently reachable.
    fn is_available(&self) -> bool;

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}
