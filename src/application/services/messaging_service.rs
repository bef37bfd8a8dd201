//! Messaging Service
//!
//! Chat messages and typing indicators: persist, deliver to local
//! sessions, then publish so other instances deliver to theirs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::delivery::LocalDelivery;
use crate::application::events::RealtimeEvent;
use crate::application::relay::RealtimeRelay;
use crate::domain::{ChatMessage, ChatMessageRepository, ChatType, MAX_MESSAGE_LENGTH};
use crate::shared::error::AppError;

/// Default page size for message history
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Messaging service trait
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Post a message to a chatroom
    async fn send_message(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        sender_id: i64,
        content: String,
    ) -> Result<ChatMessage, MessagingError>;

    /// Message history, newest first
    async fn list_messages(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        before: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, MessagingError>;

    /// Typing indicator from a connected user
    async fn broadcast_typing(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        user_id: i64,
        is_typing: bool,
    );
}

/// Messaging service errors
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Message must not be empty")]
    EmptyContent,

    #[error("Message must be at most {MAX_MESSAGE_LENGTH} characters")]
    ContentTooLong,

    #[error("Repository error: {0}")]
    Repository(#[from] AppError),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::EmptyContent | MessagingError::ContentTooLong => {
                AppError::Validation(err.to_string())
            }
            MessagingError::Repository(inner) => inner,
        }
    }
}

/// MessagingService implementation
pub struct MessagingServiceImpl {
    messages: Arc<dyn ChatMessageRepository>,
    relay: Arc<RealtimeRelay>,
    local: Arc<dyn LocalDelivery>,
}

impl MessagingServiceImpl {
    pub fn new(
        messages: Arc<dyn ChatMessageRepository>,
        relay: Arc<RealtimeRelay>,
        local: Arc<dyn LocalDelivery>,
    ) -> Self {
        Self {
            messages,
            relay,
            local,
        }
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[async_trait]
impl MessagingService for MessagingServiceImpl {
    async fn send_message(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        sender_id: i64,
        content: String,
    ) -> Result<ChatMessage, MessagingError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(MessagingError::EmptyContent);
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(MessagingError::ContentTooLong);
        }

        let message = ChatMessage::new(chat_type, chatroom_id, sender_id, content);
        let message = self.messages.create(&message).await?;

        let event = RealtimeEvent::NewMessage {
            message: message.clone(),
        }
        .to_value();
        let local = self
            .local
            .deliver_to_chatroom(chat_type, chatroom_id, &event, None);
        let outcome = self.relay.publish(&message.channel(), &event).await;
        debug!(
            message_id = %message.id,
            channel = %message.channel(),
            local,
            outcome = outcome.as_str(),
            "Message broadcast"
        );

        Ok(message)
    }

    async fn list_messages(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        before: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, MessagingError> {
        Ok(self
            .messages
            .find_by_chatroom(chat_type, chatroom_id, before, clamp_limit(limit))
            .await?)
    }

    async fn broadcast_typing(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        user_id: i64,
        is_typing: bool,
    ) {
        let event = RealtimeEvent::Typing {
            chat_type,
            chatroom_id,
            user_id,
            is_typing,
        }
        .to_value();
        self.local
            .deliver_to_chatroom(chat_type, chatroom_id, &event, Some(user_id));
        self.relay
            .publish_chatroom(chat_type, chatroom_id, &event)
            .await;
    }
}
