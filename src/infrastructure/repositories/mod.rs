//! Repository Implementations
//!
//! PostgreSQL implementations of the domain repository traits.
//!
//! - **ChatMessageRepository** - Chat messages with cursor pagination
//! - **NotificationRepository** - User notifications

mod chat_message_repository;
mod notification_repository;

pub use chat_message_repository::PgChatMessageRepository;
pub use notification_repository::PgNotificationRepository;
