//! In-Process Broker
//!
//! A `MemoryBus` plays the role of a Redis server shared by several relay
//! instances living in one process. Like Redis, a publish reaches every
//! connected broker subscribed to the channel, the publisher included.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::broker::{Broker, BrokerError, BrokerInbound, BrokerMessage};

struct Peer {
    id: u64,
    channels: HashSet<String>,
    sender: mpsc::UnboundedSender<BrokerMessage>,
}

struct BusInner {
    peers: Mutex<Vec<Peer>>,
    available: AtomicBool,
    next_id: AtomicU64,
}

impl BusInner {
    fn deliver(&self, channel: &str, payload: &str) -> usize {
        let mut peers = self.peers.lock();
        peers.retain(|peer| !peer.sender.is_closed());

        let mut delivered = 0;
        for peer in peers.iter().filter(|p| p.channels.contains(channel)) {
            let message = BrokerMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            if peer.sender.send(message).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn with_peer<R>(&self, id: u64, f: impl FnOnce(&mut Peer) -> R) -> Option<R> {
        self.peers.lock().iter_mut().find(|p| p.id == id).map(f)
    }
}

/// Shared in-memory broker.
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                peers: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a new broker client to the bus.
    pub fn connect(&self) -> (MemoryBroker, BrokerInbound) {
        let (sender, inbound) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.peers.lock().push(Peer {
            id,
            channels: HashSet::new(),
            sender,
        });
        let broker = MemoryBroker {
            id,
            bus: Arc::clone(&self.inner),
        };
        (broker, inbound)
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Deliver raw text to every subscriber of `channel`, bypassing envelopes.
    ///
    /// Returns the number of brokers that received it.
    pub fn inject(&self, channel: &str, payload: &str) -> usize {
        self.inner.deliver(channel, payload)
    }

    /// Number of attached brokers subscribed to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .peers
            .lock()
            .iter()
            .filter(|p| !p.sender.is_closed() && p.channels.contains(channel))
            .count()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One client of a `MemoryBus`.
pub struct MemoryBroker {
    id: u64,
    bus: Arc<BusInner>,
}

impl MemoryBroker {
    fn ensure_available(&self) -> Result<(), BrokerError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(BrokerError::Unavailable)
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        self.ensure_available()?;
        self.bus.deliver(channel, payload);
        Ok(())
    }

    // Like the Redis broker, a subscription made during an outage is kept
    // and takes effect once the bus is available again.
    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.bus
            .with_peer(self.id, |peer| {
                peer.channels.insert(channel.to_string());
            })
            .ok_or(BrokerError::Closed)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.bus
            .with_peer(self.id, |peer| {
                peer.channels.remove(channel);
            })
            .ok_or(BrokerError::Closed)
    }

    fn is_available(&self) -> bool {
        self.bus.available.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Drop for MemoryBroker {
    fn drop(&mut self) {
        self.bus.peers.lock().retain(|p| p.id != self.id);
    }
}
