//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Post message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub content: String,
}

/// Message history query
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MessageHistoryQuery {
    pub before: Option<Uuid>,

    #[validate(range(min = 1, max = 100, message = "Limit must be 1-100"))]
    pub limit: Option<i64>,
}

/// Create notification request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 64, message = "Kind must be 1-64 characters"))]
    pub kind: String,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Body must be at most 2000 characters"))]
    pub body: Option<String>,

    pub data: Option<serde_json::Value>,
}

/// Notification list query
#[derive(Debug, Default, Deserialize, Validate)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,

    #[validate(range(min = 1, max = 100, message = "Limit must be 1-100"))]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_rejected() {
        let request = SendMessageRequest {
            content: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_limit_range() {
        let query = MessageHistoryQuery {
            before: None,
            limit: Some(101),
        };
        assert!(query.validate().is_err());
        assert!(MessageHistoryQuery::default().validate().is_ok());
    }

    #[test]
    fn test_notification_body_optional() {
        let request = CreateNotificationRequest {
            kind: "event_invite".into(),
            title: "You're invited".into(),
            body: None,
            data: None,
        };
        assert!(request.validate().is_ok());
    }
}
