//! Realtime payloads
//!
//! Payloads published through the relay and pushed to local sockets.
//! The `type` tag selects the client event name in the WebSocket gateway.

use serde::Serialize;
use serde_json::Value;

use crate::domain::{ChatMessage, ChatType, Notification};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RealtimeEvent {
    NewMessage {
        message: ChatMessage,
    },
    Typing {
        chat_type: ChatType,
        chatroom_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    Notification {
        notification: Notification,
    },
}

impl RealtimeEvent {
    /// JSON form shared by local delivery and the relay.
    pub fn to_value(&self) -> Value {
        // Only derived Serialize impls with string keys; cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
