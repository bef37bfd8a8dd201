//! Local delivery seam
//!
//! Services push events to sockets attached to this instance through
//! [`LocalDelivery`]; the relay only carries them to other instances.

use serde_json::Value;

use crate::domain::ChatType;

/// Pushes payloads to sessions connected to this instance.
///
/// Returns the number of sessions the payload was queued for.
#[cfg_attr(test, mockall::automock)]
pub trait LocalDelivery: Send + Sync {
    fn deliver_to_user(&self, user_id: i64, payload: &Value) -> usize;

    fn deliver_to_chatroom(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        payload: &Value,
        exclude_user: Option<i64>,
    ) -> usize;
}
