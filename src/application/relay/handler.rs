//! Subscription handlers

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Channel, Envelope};

/// One envelope handed to one subscription.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: Channel,
    pub envelope: Arc<Envelope>,
}

/// Callback invoked for envelopes arriving from other instances.
///
/// Any `Fn(Delivery) -> impl Future<Output = anyhow::Result<()>>` closure is a
/// handler.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: Delivery) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, delivery: Delivery) -> anyhow::Result<()> {
        (self)(delivery).await
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
