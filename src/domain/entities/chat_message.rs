//! Chat message entity and repository trait.
//!
//! Maps to the `chat_messages` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::channel::{Channel, ChatType};
use crate::shared::error::AppError;

/// Maximum message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A message posted to a chatroom.
///
/// Maps to the `chat_messages` table:
/// - id: UUID PRIMARY KEY (v7, time ordered)
/// - chat_type: TEXT NOT NULL
/// - chatroom_id: BIGINT NOT NULL
/// - sender_id: BIGINT NOT NULL
/// - content: TEXT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_type: ChatType,
    pub chatroom_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new, not yet persisted message.
    pub fn new(chat_type: ChatType, chatroom_id: i64, sender_id: i64, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_type,
            chatroom_id,
            sender_id,
            content,
            created_at: Utc::now(),
        }
    }

    /// Broadcast channel of the chatroom this message belongs to.
    pub fn channel(&self) -> Channel {
        Channel::chatroom(self.chat_type, self.chatroom_id)
    }
}

/// Repository trait for chat message persistence.
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Store a new message.
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError>;

    /// Messages of a chatroom, newest first.
    ///
    /// `before` restricts the page to messages created before that message.
    async fn find_by_chatroom(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        before: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError>;
}
