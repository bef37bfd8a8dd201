//! Realtime Fan-Out Relay
//!
//! Lets an event raised on one server instance reach WebSocket clients
//! attached to any other instance.
//!
//! ```text
//! instance N                      broker                     instance M
//! ----------                      ------                     ----------
//! local emit
//! publish(ch, payload) ──> ns:ch {payload, origin=N, ts} ──> receive
//!                                   │                          origin != M
//!                                   └──> receive on N           └─> handlers(ch)
//!                                         origin == N: dropped
//! ```
//!
//! Without a broker the relay runs in single-instance mode: publishing is a
//! no-op and local delivery is unaffected.

mod handler;
mod registry;
mod service;

pub use handler::{Delivery, EventHandler, SubscriptionId};
pub use service::{Disposition, PublishOutcome, RealtimeRelay};
