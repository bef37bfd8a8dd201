//! # Nearby Traveler Realtime
//!
//! Real-time layer of Nearby Traveler:
//! - Cross-instance fan-out relay over Redis pub/sub, with origin echo
//!   suppression and a degraded single-instance mode
//! - WebSocket gateway for chat and notification delivery
//! - HTTP endpoints that persist chat messages and notifications
//!
//! ## Module Structure
//!
//! ```text
//! nearby_realtime/
//! +-- config/         Configuration management
//! +-- domain/         Channels, envelopes, instance ids, persisted records
//! +-- application/    Fan-out relay, services and DTOs
//! +-- infrastructure/ Database, brokers and metrics
//! +-- presentation/   HTTP routes and WebSocket gateway
//! +-- shared/         Common utilities (errors, validation, time)
//! ```

// Configuration module
pub mod config;

// Domain layer
pub mod domain;

// Application layer - relay and services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
