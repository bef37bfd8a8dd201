//! Chat Message Repository Implementation
//!
//! PostgreSQL implementation of chat message storage with cursor-based
//! pagination. Ids are UUIDv7, so ordering by id is ordering by time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ChatMessage, ChatMessageRepository, ChatType};
use crate::shared::error::AppError;

/// PostgreSQL chat message repository implementation.
pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    /// Creates a new PgChatMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for chat message queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: Uuid,
    chat_type: String,
    chatroom_id: i64,
    sender_id: i64,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatMessageRow {
    fn into_message(self) -> Result<ChatMessage, AppError> {
        let chat_type = self.chat_type.parse::<ChatType>().map_err(|e| {
            AppError::Internal(format!("Invalid chat_type in row {}: {}", self.id, e))
        })?;
        Ok(ChatMessage {
            id: self.id,
            chat_type,
            chatroom_id: self.chatroom_id,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages (id, chat_type, chatroom_id, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_type, chatroom_id, sender_id, content, created_at
            "#,
        )
        .bind(message.id)
        .bind(message.chat_type.as_str())
        .bind(message.chatroom_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_message()
    }

    async fn find_by_chatroom(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        before: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = match before {
            Some(before_id) => {
                sqlx::query_as::<_, ChatMessageRow>(
                    r#"
                    SELECT id, chat_type, chatroom_id, sender_id, content, created_at
                    FROM chat_messages
                    WHERE chat_type = $1 AND chatroom_id = $2 AND id < $3
                    ORDER BY id DESC
                    LIMIT $4
                    "#,
                )
                .bind(chat_type.as_str())
                .bind(chatroom_id)
                .bind(before_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ChatMessageRow>(
                    r#"
                    SELECT id, chat_type, chatroom_id, sender_id, content, created_at
                    FROM chat_messages
                    WHERE chat_type = $1 AND chatroom_id = $2
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(chat_type.as_str())
                .bind(chatroom_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(ChatMessageRow::into_message).collect()
    }
}
