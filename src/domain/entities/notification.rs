//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// A notification addressed to one user.
///
/// Maps to the `notifications` table:
/// - id: UUID PRIMARY KEY
/// - user_id: BIGINT NOT NULL
/// - kind: TEXT NOT NULL (e.g. "connection_request", "event_invite")
/// - title: TEXT NOT NULL
/// - body: TEXT NULL
/// - data: JSONB NULL
/// - read: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub data: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: i64,
        kind: String,
        title: String,
        body: Option<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            kind,
            title,
            body,
            data,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for notification persistence.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a new notification.
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    /// Notifications of a user, newest first.
    async fn find_by_user(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError>;

    /// Mark a notification as read. Returns false if it does not belong to the user.
    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<bool, AppError>;
}
