//! Redis Broker
//!
//! Uses two connections, as a connection in subscriber mode cannot issue
//! other commands:
//!
//! ```text
//!   publish() ──> ConnectionManager ──> PUBLISH ns:channel payload
//!
//!   supervisor task
//!     ├─ PubSub sink    <── Subscribe / Unsubscribe commands
//!     └─ PubSub stream  ──> BrokerMessage ──> relay inbound queue
//! ```
//!
//! The supervisor owns the subscriber connection. The set of subscribed
//! channels is tracked here rather than read back from Redis, so every
//! reconnect can re-subscribe to all of them. Reconnects follow an
//! exponential backoff with a retry cap; once the cap is exhausted the broker
//! stays unavailable and the relay keeps running in degraded mode.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backoff::ExponentialBackoff;
use super::broker::{Broker, BrokerError, BrokerInbound, BrokerMessage};
use crate::config::ReconnectSettings;
use crate::infrastructure::metrics;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

enum SubscriberCommand {
    Subscribe(String),
    Unsubscribe(String),
    Shutdown,
}

/// How a connected session ended.
enum SessionEnd {
    Shutdown,
    Lost { was_connected: bool, error: String },
}

struct Shared {
    channels: Mutex<BTreeSet<String>>,
    publisher: RwLock<Option<ConnectionManager>>,
    connected: watch::Sender<bool>,
}

impl Shared {
    fn set_connected(&self, publisher: Option<ConnectionManager>) {
        let connected = publisher.is_some();
        *self.publisher.write() = publisher;
        self.connected.send_replace(connected);
        metrics::set_broker_connected(connected);
    }

    fn tracked_channels(&self) -> Vec<String> {
        self.channels.lock().iter().cloned().collect()
    }
}

/// Redis-backed broker with a supervised subscriber connection.
pub struct RedisBroker {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<SubscriberCommand>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RedisBroker {
    /// Open a client for `url` and start the subscriber supervisor.
    ///
    /// Returns without waiting for the first connection; use
    /// [`RedisBroker::wait_until_connected`] to block on it.
    pub fn connect(
        url: &str,
        reconnect: &ReconnectSettings,
    ) -> Result<(Self, BrokerInbound), BrokerError> {
        let client = Client::open(url)?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            channels: Mutex::new(BTreeSet::new()),
            publisher: RwLock::new(None),
            connected,
        });

        let supervisor = tokio::spawn(supervise(
            client,
            Arc::clone(&shared),
            command_rx,
            inbound_tx,
            ExponentialBackoff::new(reconnect),
        ));

        let broker = Self {
            shared,
            commands: command_tx,
            supervisor: Mutex::new(Some(supervisor)),
        };
        Ok((broker, inbound_rx))
    }

    /// Wait until the subscriber is connected, or the timeout elapses.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.connected.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|connected| *connected))
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false)
    }

    /// Stop the supervisor. Publishing afterwards fails with `Unavailable`.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(SubscriberCommand::Shutdown);
        let handle = self.supervisor.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("Broker supervisor did not stop in time, aborting");
                handle.abort();
            }
        }
        self.shared.set_connected(None);
    }
}

impl Drop for RedisBroker {
    fn drop(&mut self) {
        let _ = self.commands.send(SubscriberCommand::Shutdown);
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self
            .shared
            .publisher
            .read()
            .clone()
            .ok_or(BrokerError::Unavailable)?;
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let added = self.shared.channels.lock().insert(channel.to_string());
        if added {
            // Applied now if connected, otherwise on the next (re)connect.
            self.commands
                .send(SubscriberCommand::Subscribe(channel.to_string()))
                .map_err(|_| BrokerError::Closed)?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let removed = self.shared.channels.lock().remove(channel);
        if removed {
            self.commands
                .send(SubscriberCommand::Unsubscribe(channel.to_string()))
                .map_err(|_| BrokerError::Closed)?;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        *self.shared.connected.borrow()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Outer reconnection loop.
async fn supervise(
    client: Client,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<SubscriberCommand>,
    inbound: mpsc::UnboundedSender<BrokerMessage>,
    mut backoff: ExponentialBackoff,
) {
    loop {
        match run_session(&client, &shared, &mut commands, &inbound).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost {
                was_connected,
                error,
            } => {
                shared.set_connected(None);
                if was_connected {
                    backoff.reset();
                }
                let Some(delay) = backoff.next_delay() else {
                    error!(
                        error = %error,
                        attempts = backoff.attempts(),
                        "Redis unreachable, giving up; relay stays in single-instance mode"
                    );
                    break;
                };
                metrics::record_reconnect_attempt();
                warn!(
                    error = %error,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Redis connection lost, reconnecting"
                );
                if drain_during_backoff(&mut commands, delay).await {
                    break;
                }
            }
        }
    }
    shared.set_connected(None);
    info!("Redis subscriber stopped");
}

/// Connect both connections, re-subscribe, then pump messages and commands.
async fn run_session(
    client: &Client,
    shared: &Shared,
    commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
    inbound: &mpsc::UnboundedSender<BrokerMessage>,
) -> SessionEnd {
    let lost = |error: redis::RedisError, was_connected: bool| SessionEnd::Lost {
        was_connected,
        error: error.to_string(),
    };

    // The subscriber goes first: it fails fast, while the connection
    // manager retries internally before giving up.
    let pubsub = match client.get_async_pubsub().await {
        Ok(pubsub) => pubsub,
        Err(e) => return lost(e, false),
    };
    let publisher = match ConnectionManager::new(client.clone()).await {
        Ok(conn) => conn,
        Err(e) => return lost(e, false),
    };
    let (mut sink, mut stream) = pubsub.split();

    let channels = shared.tracked_channels();
    for channel in &channels {
        if let Err(e) = sink.subscribe(channel).await {
            return lost(e, false);
        }
    }

    shared.set_connected(Some(publisher));
    info!(channels = channels.len(), "Redis subscriber connected");

    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(msg) = msg else {
                    return SessionEnd::Lost {
                        was_connected: true,
                        error: "message stream ended".into(),
                    };
                };
                let channel = msg.get_channel_name().to_string();
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        if inbound.send(BrokerMessage { channel, payload }).is_err() {
                            // Relay dropped its receiver.
                            return SessionEnd::Shutdown;
                        }
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Non-text payload from Redis");
                        metrics::record_received("malformed");
                    }
                }
            }
            cmd = commands.recv() => {
                let result = match cmd {
                    Some(SubscriberCommand::Subscribe(channel)) => sink.subscribe(&channel).await,
                    Some(SubscriberCommand::Unsubscribe(channel)) => sink.unsubscribe(&channel).await,
                    Some(SubscriberCommand::Shutdown) | None => return SessionEnd::Shutdown,
                };
                if let Err(e) = result {
                    return lost(e, true);
                }
            }
        }
    }
}

/// Sleep through a backoff delay while honoring shutdown.
///
/// Subscribe commands received meanwhile need no action: the tracked channel
/// set already holds them and the next session re-subscribes.
async fn drain_during_backoff(
    commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
    delay: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return false,
            cmd = commands.recv() => match cmd {
                Some(SubscriberCommand::Shutdown) | None => return true,
                Some(_) => continue,
            }
        }
    }
}
