//! Channel -> handler registry
//!
//! Every subscription owns an unbounded FIFO drained by its own task:
//! a slow handler only delays its own queue, and a failing or panicking
//! handler is logged without affecting the others.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::handler::{Delivery, EventHandler, SubscriptionId};
use crate::domain::{Channel, Envelope};
use crate::infrastructure::metrics;

struct Subscription {
    id: SubscriptionId,
    queue: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
pub(crate) struct Registry {
    channels: DashMap<Channel, Vec<Subscription>>,
    index: DashMap<SubscriptionId, Channel>,
}

impl Registry {
    /// Register a handler and start its worker.
    ///
    /// Returns true when this is the first subscription on the channel.
    pub(crate) fn insert(
        &self,
        id: SubscriptionId,
        channel: Channel,
        handler: Arc<dyn EventHandler>,
    ) -> bool {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(id, handler, rx));

        self.index.insert(id, channel.clone());
        let mut subs = self.channels.entry(channel).or_default();
        subs.push(Subscription { id, queue });
        subs.len() == 1
    }

    /// Remove a subscription.
    ///
    /// Returns the channel and whether it has no handlers left, or `None`
    /// for an unknown id. Deliveries already queued are still handled.
    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<(Channel, bool)> {
        let (_, channel) = self.index.remove(&id)?;
        let now_empty = {
            match self.channels.get_mut(&channel) {
                Some(mut subs) => {
                    subs.retain(|s| s.id != id);
                    subs.is_empty()
                }
                None => true,
            }
        };
        if now_empty {
            self.channels.remove_if(&channel, |_, subs| subs.is_empty());
        }
        Some((channel, now_empty))
    }

    /// Queue an envelope for every handler of `channel`.
    pub(crate) fn dispatch(&self, channel: &Channel, envelope: Envelope) -> usize {
        let Some(subs) = self.channels.get(channel) else {
            return 0;
        };
        let envelope = Arc::new(envelope);
        subs.iter()
            .filter(|sub| {
                sub.queue
                    .send(Delivery {
                        channel: channel.clone(),
                        envelope: Arc::clone(&envelope),
                    })
                    .is_ok()
            })
            .count()
    }

    pub(crate) fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.iter().map(|e| e.key().clone()).collect();
        channels.sort();
        channels
    }

    pub(crate) fn handler_count(&self, channel: &Channel) -> usize {
        self.channels.get(channel).map(|subs| subs.len()).unwrap_or(0)
    }
}

async fn run_worker(
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    mut queue: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(delivery) = queue.recv().await {
        let channel = delivery.channel.clone();
        match AssertUnwindSafe(handler.handle(delivery)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::record_handler_failure();
                warn!(subscription = %id, channel = %channel, error = %e, "Relay handler failed");
            }
            Err(_) => {
                metrics::record_handler_failure();
                error!(subscription = %id, channel = %channel, "Relay handler panicked");
            }
        }
    }
}
