//! WebSocket Message Types
//!
//! Client frames are JSON objects tagged by `type`; server frames are
//! `{"event": <name>, "data": <object>}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::envelope::TYPE_FIELD;
use crate::domain::ChatType;

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Auth {
        token: String,
    },
    JoinChatroom {
        chat_type: ChatType,
        chatroom_id: i64,
    },
    LeaveChatroom {
        chat_type: ChatType,
        chatroom_id: i64,
    },
    Typing {
        chat_type: ChatType,
        chatroom_id: i64,
        is_typing: bool,
    },
    Ping,
}

/// Messages sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerMessage {
    pub event: String,
    pub data: Value,
}

/// Client event name for a relay payload `type`.
pub fn client_event_name(payload_type: Option<&str>) -> &str {
    match payload_type {
        Some("new_message") => "message:new",
        Some("message_updated") => "message:updated",
        Some("message_deleted") => "message:deleted",
        Some("typing") => "user:typing",
        Some("read_receipt") => "message:read",
        Some("notification") => "notification:new",
        Some("connection_request") => "connection:request",
        Some("connection_accepted") => "connection:accepted",
        Some(other) => other,
        None => "event",
    }
}

impl ServerMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Route a relay payload to its client event.
    pub fn from_payload(payload: &Value) -> Self {
        let payload_type = payload.get(TYPE_FIELD).and_then(Value::as_str);
        Self::new(client_event_name(payload_type), payload.clone())
    }

    pub fn ready(session_id: &str, user_id: i64, instance_id: &str) -> Self {
        Self::new(
            "ready",
            json!({
                "sessionId": session_id,
                "userId": user_id,
                "instanceId": instance_id,
            }),
        )
    }

    pub fn pong() -> Self {
        Self::new("pong", json!({}))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", json!({ "message": message.into() }))
    }

    pub fn chatroom_joined(chat_type: ChatType, chatroom_id: i64) -> Self {
        Self::new(
            "chatroom:joined",
            json!({ "chatType": chat_type, "chatroomId": chatroom_id }),
        )
    }

    pub fn chatroom_left(chat_type: ChatType, chatroom_id: i64) -> Self {
        Self::new(
            "chatroom:left",
            json!({ "chatType": chat_type, "chatroomId": chatroom_id }),
        )
    }
}
