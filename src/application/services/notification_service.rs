//! Notification Service
//!
//! Stores a notification and pushes it to every session of its recipient,
//! wherever that session is connected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::delivery::LocalDelivery;
use super::messaging_service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::application::events::RealtimeEvent;
use crate::application::relay::RealtimeRelay;
use crate::domain::{Notification, NotificationRepository};
use crate::shared::error::AppError;

/// Input for a new notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// Notification service trait
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Store and push a notification
    async fn notify(
        &self,
        user_id: i64,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError>;

    /// Notifications of a user, newest first
    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>, NotificationError>;

    /// Mark one of the user's notifications as read
    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<(), NotificationError>;
}

/// Notification service errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Repository error: {0}")]
    Repository(#[from] AppError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Repository(inner) => inner,
        }
    }
}

/// NotificationService implementation
pub struct NotificationServiceImpl {
    notifications: Arc<dyn NotificationRepository>,
    relay: Arc<RealtimeRelay>,
    local: Arc<dyn LocalDelivery>,
}

impl NotificationServiceImpl {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        relay: Arc<RealtimeRelay>,
        local: Arc<dyn LocalDelivery>,
    ) -> Self {
        Self {
            notifications,
            relay,
            local,
        }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn notify(
        &self,
        user_id: i64,
        input: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let notification =
            Notification::new(user_id, input.kind, input.title, input.body, input.data);
        let notification = self.notifications.create(&notification).await?;

        let event = RealtimeEvent::Notification {
            notification: notification.clone(),
        }
        .to_value();
        let local = self.local.deliver_to_user(user_id, &event);
        let outcome = self.relay.publish_user(user_id, &event).await;
        debug!(
            notification_id = %notification.id,
            user_id,
            local,
            outcome = outcome.as_str(),
            "Notification pushed"
        );

        Ok(notification)
    }

    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .notifications
            .find_by_user(user_id, unread_only, limit)
            .await?)
    }

    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<(), NotificationError> {
        if self.notifications.mark_read(user_id, id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }
}
