//! Pub/Sub Module
//!
//! Message broker adapters used by the fan-out relay.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |  RealtimeRelay    |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   Broker Trait    |  <-- publish / subscribe / unsubscribe
//! +-------------------+
//!      |         |
//!      v         v
//! +---------+ +-----------+
//! |  Redis  | | MemoryBus |  <-- in-process, several instances per process
//! +---------+ +-----------+
//! ```
//!
//! Inbound messages flow back through an unbounded queue returned by each
//! broker's constructor.

mod backoff;
mod broker;
mod memory_broker;
mod redis_broker;

pub use backoff::ExponentialBackoff;
pub use broker::{Broker, BrokerError, BrokerInbound, BrokerMessage};
pub use memory_broker::{MemoryBroker, MemoryBus};
pub use redis_broker::RedisBroker;
