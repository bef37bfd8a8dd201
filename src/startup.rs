//! Application Startup
//!
//! Application building and server initialization.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

use crate::application::relay::RealtimeRelay;
use crate::application::services::{
    LocalDelivery, MessagingService, MessagingServiceImpl, NotificationService,
    NotificationServiceImpl,
};
use crate::config::Settings;
use crate::domain::{ChatMessageRepository, InstanceId, NotificationRepository};
use crate::infrastructure::database;
use crate::infrastructure::pubsub::RedisBroker;
use crate::infrastructure::repositories::{PgChatMessageRepository, PgNotificationRepository};
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Gateway;

/// How long startup waits for the first broker connection
const BROKER_CONNECT_WAIT: Duration = Duration::from_secs(5);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub relay: Arc<RealtimeRelay>,
    pub gateway: Arc<Gateway>,
    pub messaging: Arc<dyn MessagingService>,
    pub notifications: Arc<dyn NotificationService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire services around the given repositories and relay.
    pub fn new(
        db: PgPool,
        relay: Arc<RealtimeRelay>,
        messages: Arc<dyn ChatMessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        settings: Settings,
    ) -> Self {
        let gateway = Gateway::new(Arc::clone(&relay));
        let local: Arc<dyn LocalDelivery> = gateway.clone();

        Self {
            db,
            messaging: Arc::new(MessagingServiceImpl::new(
                messages,
                Arc::clone(&relay),
                Arc::clone(&local),
            )),
            notifications: Arc::new(NotificationServiceImpl::new(
                notifications,
                Arc::clone(&relay),
                local,
            )),
            relay,
            gateway,
            settings: Arc::new(settings),
        }
    }
}

/// Build the relay, connecting to Redis when a URL is configured.
///
/// Broker problems never fail startup: the relay falls back to
/// single-instance mode or keeps reconnecting in the background.
pub async fn build_relay(settings: &Settings) -> (Arc<RealtimeRelay>, Option<Arc<RedisBroker>>) {
    let instance_id = InstanceId::from_config(settings.relay.instance_id.as_deref());
    let namespace = settings.relay.namespace.clone();

    let Some(url) = settings.redis.broker_url() else {
        tracing::warn!("REDIS_URL not set, realtime relay limited to this instance");
        return (
            Arc::new(RealtimeRelay::single_instance(instance_id, namespace)),
            None,
        );
    };

    match RedisBroker::connect(url, &settings.relay.reconnect) {
        Ok((broker, inbound)) => {
            let broker = Arc::new(broker);
            if broker.wait_until_connected(BROKER_CONNECT_WAIT).await {
                tracing::info!("Redis broker connected");
            } else {
                tracing::warn!("Redis broker not reachable yet, continuing in degraded mode");
            }
            let relay = RealtimeRelay::with_broker(instance_id, namespace, broker.clone(), inbound);
            (Arc::new(relay), Some(broker))
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid Redis configuration, running single-instance");
            (
                Arc::new(RealtimeRelay::single_instance(instance_id, namespace)),
                None,
            )
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    broker: Option<Arc<RedisBroker>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database connection pool created");

        let (relay, broker) = build_relay(&settings).await;
        tracing::info!(
            instance = %relay.instance_id(),
            namespace = relay.namespace(),
            "Realtime relay ready"
        );

        let state = AppState::new(
            db.clone(),
            relay,
            Arc::new(PgChatMessageRepository::new(db.clone())),
            Arc::new(PgNotificationRepository::new(db)),
            settings.clone(),
        );

        // Build router with middleware
        let router = routes::create_router(state).layer(
            ServiceBuilder::new()
                .layer(logging::create_trace_layer())
                .layer(cors::create_cors_layer(&settings.cors)),
        );

        // Bind to address
        let addr = settings.server.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            broker,
        })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(broker) = self.broker {
            broker.shutdown().await;
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
