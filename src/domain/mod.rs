//! # Domain Layer
//!
//! Core types of the real-time layer, independent of Redis, Axum and
//! PostgreSQL.
//!
//! ## Structure
//!
//! - **channel**: broadcast channel names and their naming conventions
//! - **instance**: the per-process origin identifier
//! - **envelope**: the wire format shared by all instances
//! - **entities**: persisted records (chat messages, notifications) and
//!   their repository traits

pub mod channel;
pub mod entities;
pub mod envelope;
pub mod instance;

// Re-export commonly used types
pub use channel::{Channel, ChannelError, ChannelScope, ChatType};
pub use entities::*;
pub use envelope::{Envelope, EnvelopeError};
pub use instance::InstanceId;
