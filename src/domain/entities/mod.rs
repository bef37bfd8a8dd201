//! # Domain Entities
//!
//! Records persisted alongside real-time delivery.
//!
//! - **ChatMessage**: a message posted to a chatroom
//! - **Notification**: a notification addressed to one user
//!
//! Each entity has an associated repository trait implemented in the
//! infrastructure layer.

mod chat_message;
mod notification;

pub use chat_message::{ChatMessage, ChatMessageRepository, MAX_MESSAGE_LENGTH};
pub use notification::{Notification, NotificationRepository};
