//! Realtime Relay Service

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handler::{EventHandler, SubscriptionId};
use super::registry::Registry;
use crate::domain::{Channel, ChatType, Envelope, InstanceId};
use crate::infrastructure::metrics;
use crate::infrastructure::pubsub::{Broker, BrokerError, BrokerInbound, BrokerMessage};
use crate::shared::time::now_millis;

/// Result of a publish call. Publishing never fails loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the broker.
    Published,
    /// No broker configured, or the broker is unreachable.
    Degraded,
    /// Serialization or broker error; logged.
    Failed,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishOutcome::Published => "published",
            PublishOutcome::Degraded => "degraded",
            PublishOutcome::Failed => "failed",
        }
    }
}

/// What happened to one inbound broker message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Queued for this many handlers (possibly zero).
    Delivered(usize),
    /// Published by this instance; dropped.
    Echo,
    /// Not a valid envelope; dropped.
    Malformed,
    /// Outside the relay namespace; ignored.
    Foreign,
}

impl Disposition {
    fn metric_label(&self) -> &'static str {
        match self {
            Disposition::Delivered(_) => "delivered",
            Disposition::Echo => "echo",
            Disposition::Malformed => "malformed",
            Disposition::Foreign => "foreign",
        }
    }
}

/// State shared between the relay and its inbound pump.
struct Inbound {
    instance_id: InstanceId,
    namespace: String,
    registry: Registry,
}

impl Inbound {
    fn route(&self, broker_channel: &str, text: &str) -> Disposition {
        let disposition = self.classify(broker_channel, text);
        metrics::record_received(disposition.metric_label());
        disposition
    }

    fn classify(&self, broker_channel: &str, text: &str) -> Disposition {
        let Some(channel) = Channel::from_broker_name(&self.namespace, broker_channel) else {
            debug!(channel = %broker_channel, "Ignoring message outside relay namespace");
            return Disposition::Foreign;
        };

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Dropping malformed envelope");
                return Disposition::Malformed;
            }
        };

        if envelope.is_from(&self.instance_id) {
            return Disposition::Echo;
        }

        let origin = envelope.origin_instance_id.clone();
        let handlers = self.registry.dispatch(&channel, envelope);
        debug!(channel = %channel, origin = %origin, handlers, "Envelope received");
        Disposition::Delivered(handlers)
    }
}

/// Cross-instance fan-out relay.
///
/// Constructed once per process and shared as `Arc<RealtimeRelay>`.
/// Envelopes published here reach handlers subscribed on *other* instances;
/// local delivery is the caller's job and happens before publishing.
pub struct RealtimeRelay {
    inbound: Arc<Inbound>,
    broker: Option<Arc<dyn Broker>>,
    next_id: AtomicU64,
    // Serializes registry changes with the matching broker (un)subscribe.
    membership: Mutex<()>,
    pump: Option<JoinHandle<()>>,
}

impl RealtimeRelay {
    /// Relay without a broker: publishes are no-ops, subscriptions are local.
    pub fn single_instance(instance_id: InstanceId, namespace: impl Into<String>) -> Self {
        info!(instance = %instance_id, "Realtime relay running in single-instance mode");
        Self {
            inbound: Arc::new(Inbound {
                instance_id,
                namespace: namespace.into(),
                registry: Registry::default(),
            }),
            broker: None,
            next_id: AtomicU64::new(1),
            membership: Mutex::new(()),
            pump: None,
        }
    }

    /// Relay backed by `broker`, draining `inbound` on a background task.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_broker(
        instance_id: InstanceId,
        namespace: impl Into<String>,
        broker: Arc<dyn Broker>,
        mut inbound_rx: BrokerInbound,
    ) -> Self {
        info!(
            instance = %instance_id,
            broker = broker.name(),
            "Realtime relay running with broker"
        );
        let inbound = Arc::new(Inbound {
            instance_id,
            namespace: namespace.into(),
            registry: Registry::default(),
        });

        let pump_state = Arc::clone(&inbound);
        let pump = tokio::spawn(async move {
            while let Some(BrokerMessage { channel, payload }) = inbound_rx.recv().await {
                pump_state.route(&channel, &payload);
            }
            debug!("Broker inbound queue closed");
        });

        Self {
            inbound,
            broker: Some(broker),
            next_id: AtomicU64::new(1),
            membership: Mutex::new(()),
            pump: Some(pump),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inbound.instance_id
    }

    pub fn namespace(&self) -> &str {
        &self.inbound.namespace
    }

    /// Whether a broker is configured at all.
    pub fn has_broker(&self) -> bool {
        self.broker.is_some()
    }

    /// Name of the configured broker, if any.
    pub fn broker_name(&self) -> Option<&'static str> {
        self.broker.as_ref().map(|b| b.name())
    }

    /// Whether envelopes currently cross to other instances.
    pub fn is_available(&self) -> bool {
        self.broker.as_ref().is_some_and(|b| b.is_available())
    }

    /// Channels with at least one handler.
    pub fn channels(&self) -> Vec<Channel> {
        self.inbound.registry.channels()
    }

    pub fn handler_count(&self, channel: &Channel) -> usize {
        self.inbound.registry.handler_count(channel)
    }

    /// Invoke `handler` for every envelope published on `channel` by another
    /// instance. Subscriptions accumulate; nothing is deduplicated.
    pub async fn subscribe<H: EventHandler>(&self, channel: Channel, handler: H) -> SubscriptionId {
        self.subscribe_shared(channel, Arc::new(handler)).await
    }

    /// Like [`RealtimeRelay::subscribe`] for an already shared handler.
    pub async fn subscribe_shared(
        &self,
        channel: Channel,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _guard = self.membership.lock().await;

        let first = self.inbound.registry.insert(id, channel.clone(), handler);
        debug!(subscription = %id, channel = %channel, "Handler subscribed");

        if first {
            if let Some(broker) = &self.broker {
                let broker_channel = channel.broker_name(self.namespace());
                if let Err(e) = broker.subscribe(&broker_channel).await {
                    warn!(channel = %channel, error = %e, "Broker subscribe failed");
                }
            }
        }
        id
    }

    /// Remove one subscription. Returns false for an unknown id.
    ///
    /// The broker subscription is dropped with the channel's last handler.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let _guard = self.membership.lock().await;

        let Some((channel, now_empty)) = self.inbound.registry.remove(id) else {
            return false;
        };
        debug!(subscription = %id, channel = %channel, "Handler unsubscribed");

        if now_empty {
            if let Some(broker) = &self.broker {
                let broker_channel = channel.broker_name(self.namespace());
                if let Err(e) = broker.unsubscribe(&broker_channel).await {
                    warn!(channel = %channel, error = %e, "Broker unsubscribe failed");
                }
            }
        }
        true
    }

    /// Wrap `payload` in an envelope and send it to the other instances.
    ///
    /// Local handlers are never invoked by this call.
    pub async fn publish<T>(&self, channel: &Channel, payload: &T) -> PublishOutcome
    where
        T: Serialize + ?Sized,
    {
        let outcome = self.try_publish(channel, payload).await;
        metrics::record_publish(outcome.as_str());
        outcome
    }

    async fn try_publish<T>(&self, channel: &Channel, payload: &T) -> PublishOutcome
    where
        T: Serialize + ?Sized,
    {
        let Some(broker) = &self.broker else {
            return PublishOutcome::Degraded;
        };
        if !broker.is_available() {
            debug!(channel = %channel, "Broker unavailable, publish skipped");
            return PublishOutcome::Degraded;
        }

        let encoded = Envelope::from_serializable(self.instance_id(), payload, now_millis())
            .and_then(|envelope| envelope.encode());
        let text = match encoded {
            Ok(text) => text,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Payload could not be encoded");
                return PublishOutcome::Failed;
            }
        };

        match broker.publish(&channel.broker_name(self.namespace()), &text).await {
            Ok(()) => PublishOutcome::Published,
            Err(BrokerError::Unavailable) => {
                debug!(channel = %channel, "Broker unavailable, publish skipped");
                PublishOutcome::Degraded
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Publish failed");
                PublishOutcome::Failed
            }
        }
    }

    /// Route one raw broker message as if it came from the broker.
    pub fn receive(&self, broker_channel: &str, text: &str) -> Disposition {
        self.inbound.route(broker_channel, text)
    }

    pub async fn subscribe_chatroom<H: EventHandler>(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        handler: H,
    ) -> SubscriptionId {
        self.subscribe(Channel::chatroom(chat_type, chatroom_id), handler)
            .await
    }

    pub async fn publish_chatroom<T>(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        payload: &T,
    ) -> PublishOutcome
    where
        T: Serialize + ?Sized,
    {
        self.publish(&Channel::chatroom(chat_type, chatroom_id), payload)
            .await
    }

    pub async fn subscribe_user<H: EventHandler>(&self, user_id: i64, handler: H) -> SubscriptionId {
        self.subscribe(Channel::user(user_id), handler).await
    }

    pub async fn publish_user<T>(&self, user_id: i64, payload: &T) -> PublishOutcome
    where
        T: Serialize + ?Sized,
    {
        self.publish(&Channel::user(user_id), payload).await
    }
}

impl Drop for RealtimeRelay {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
