//! # Nearby Traveler Realtime Server
//!
//! Entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool
//! - Realtime relay (Redis or single-instance)
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use nearby_realtime::config::Settings;
use nearby_realtime::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    nearby_realtime::telemetry::init_tracing();

    info!("Starting Nearby Traveler realtime server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        broker = settings.redis.broker_url().is_some(),
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
