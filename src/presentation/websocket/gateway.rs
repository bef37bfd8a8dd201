//! WebSocket Gateway
//!
//! Session registry for sockets attached to this instance. Payloads reach
//! a session either directly ([`LocalDelivery`]) or from another instance
//! through the relay subscriptions the gateway keeps for its users and
//! chatrooms.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::messages::ServerMessage;
use crate::application::relay::{Delivery, RealtimeRelay, SubscriptionId};
use crate::application::services::LocalDelivery;
use crate::domain::{Channel, ChannelScope, ChatType};
use crate::infrastructure::metrics;

type RoomKey = (ChatType, i64);

/// A session connected to this instance
struct ConnectedSession {
    user_id: i64,
    rooms: SyncMutex<HashSet<RoomKey>>,
    sender: mpsc::Sender<ServerMessage>,
}

impl ConnectedSession {
    fn push(&self, session_id: &str, message: ServerMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %session_id, "Outbound queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    relay: Arc<RealtimeRelay>,
    /// Active sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// User ID to session IDs mapping (one user can have multiple sessions)
    user_sessions: DashMap<i64, Vec<String>>,
    /// Chatroom to session IDs mapping
    room_sessions: DashMap<RoomKey, Vec<String>>,
    /// Relay subscriptions held while the channel has a local audience
    subscriptions: DashMap<Channel, SubscriptionId>,
    /// Serializes audience changes with the matching relay calls
    membership: Mutex<()>,
    weak: Weak<Gateway>,
}

impl Gateway {
    pub fn new(relay: Arc<RealtimeRelay>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            relay,
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
            subscriptions: DashMap::new(),
            membership: Mutex::new(()),
            weak: weak.clone(),
        })
    }

    pub fn relay(&self) -> &Arc<RealtimeRelay> {
        &self.relay
    }

    /// Register an authenticated session.
    ///
    /// The user's first session on this instance subscribes the relay to the
    /// user channel.
    pub async fn register_session(
        &self,
        session_id: String,
        user_id: i64,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let _guard = self.membership.lock().await;

        let session = Arc::new(ConnectedSession {
            user_id,
            rooms: SyncMutex::new(HashSet::new()),
            sender,
        });
        self.sessions.insert(session_id.clone(), session);

        let first = {
            let mut ids = self.user_sessions.entry(user_id).or_default();
            ids.push(session_id.clone());
            ids.len() == 1
        };
        if first {
            self.hold(Channel::user(user_id)).await;
        }
        metrics::set_websocket_sessions(self.sessions.len());

        info!(user_id, session_id = %session_id, "Session registered");
    }

    /// Unregister a session, releasing relay subscriptions nobody else needs.
    pub async fn unregister_session(&self, session_id: &str) {
        let _guard = self.membership.lock().await;

        let Some((_, session)) = self.sessions.remove(session_id) else {
            return;
        };
        metrics::set_websocket_sessions(self.sessions.len());

        let rooms: Vec<RoomKey> = session.rooms.lock().drain().collect();
        for room in rooms {
            if detach(&self.room_sessions, &room, session_id) {
                self.release(&Channel::chatroom(room.0, room.1)).await;
            }
        }
        if detach(&self.user_sessions, &session.user_id, session_id) {
            self.release(&Channel::user(session.user_id)).await;
        }

        info!(
            user_id = session.user_id,
            session_id = %session_id,
            "Session unregistered"
        );
    }

    /// Add a session to a chatroom audience. Returns false for unknown sessions.
    pub async fn join_chatroom(&self, session_id: &str, chat_type: ChatType, chatroom_id: i64) -> bool {
        let _guard = self.membership.lock().await;

        let Some(session) = self.sessions.get(session_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let room = (chat_type, chatroom_id);
        if !session.rooms.lock().insert(room) {
            return true;
        }

        let first = {
            let mut ids = self.room_sessions.entry(room).or_default();
            ids.push(session_id.to_string());
            ids.len() == 1
        };
        if first {
            self.hold(Channel::chatroom(chat_type, chatroom_id)).await;
        }
        debug!(session_id = %session_id, chat_type = %chat_type, chatroom_id, "Joined chatroom");
        true
    }

    /// Remove a session from a chatroom audience. Returns false if it was not a member.
    pub async fn leave_chatroom(&self, session_id: &str, chat_type: ChatType, chatroom_id: i64) -> bool {
        let _guard = self.membership.lock().await;

        let Some(session) = self.sessions.get(session_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let room = (chat_type, chatroom_id);
        if !session.rooms.lock().remove(&room) {
            return false;
        }

        if detach(&self.room_sessions, &room, session_id) {
            self.release(&Channel::chatroom(chat_type, chatroom_id)).await;
        }
        debug!(session_id = %session_id, chat_type = %chat_type, chatroom_id, "Left chatroom");
        true
    }

    /// Send a message to one session.
    pub fn send_to_session(&self, session_id: &str, message: ServerMessage) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => session.push(session_id, message),
            None => false,
        }
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if user is online on this instance
    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }

    /// Channels this gateway currently holds relay subscriptions for.
    pub fn subscribed_channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> =
            self.subscriptions.iter().map(|e| e.key().clone()).collect();
        channels.sort();
        channels
    }

    fn send_to_sessions(&self, session_ids: &[String], message: &ServerMessage, exclude_user: Option<i64>) -> usize {
        session_ids
            .iter()
            .filter_map(|id| self.sessions.get(id).map(|s| (id, Arc::clone(s.value()))))
            .filter(|(_, session)| Some(session.user_id) != exclude_user)
            .filter(|(id, session)| session.push(id, message.clone()))
            .count()
    }

    async fn hold(&self, channel: Channel) {
        let weak = self.weak.clone();
        let id = self
            .relay
            .subscribe(channel.clone(), move |delivery: Delivery| {
                let weak = weak.clone();
                async move {
                    if let Some(gateway) = weak.upgrade() {
                        gateway.deliver_remote(&delivery);
                    }
                    Ok::<_, anyhow::Error>(())
                }
            })
            .await;
        self.subscriptions.insert(channel, id);
    }

    async fn release(&self, channel: &Channel) {
        if let Some((_, id)) = self.subscriptions.remove(channel) {
            self.relay.unsubscribe(id).await;
        }
    }

    /// Hand an envelope from another instance to the local audience.
    fn deliver_remote(&self, delivery: &Delivery) -> usize {
        let payload = delivery.envelope.payload_value();
        match delivery.channel.scope() {
            ChannelScope::User { user_id } => self.deliver_to_user(user_id, &payload),
            ChannelScope::Chatroom {
                chat_type,
                chatroom_id,
            } => {
                // The typist never sees their own indicator, on any instance.
                let exclude = match delivery.envelope.payload_type() {
                    Some("typing") => payload.get("userId").and_then(Value::as_i64),
                    _ => None,
                };
                self.deliver_to_chatroom(chat_type, chatroom_id, &payload, exclude)
            }
            ChannelScope::Custom => 0,
        }
    }
}

impl LocalDelivery for Gateway {
    fn deliver_to_user(&self, user_id: i64, payload: &Value) -> usize {
        let Some(ids) = self.user_sessions.get(&user_id).map(|ids| ids.value().clone()) else {
            return 0;
        };
        self.send_to_sessions(&ids, &ServerMessage::from_payload(payload), None)
    }

    fn deliver_to_chatroom(
        &self,
        chat_type: ChatType,
        chatroom_id: i64,
        payload: &Value,
        exclude_user: Option<i64>,
    ) -> usize {
        let Some(ids) = self
            .room_sessions
            .get(&(chat_type, chatroom_id))
            .map(|ids| ids.value().clone())
        else {
            return 0;
        };
        self.send_to_sessions(&ids, &ServerMessage::from_payload(payload), exclude_user)
    }
}

/// Remove `session_id` from `key`'s list. Returns true when the list became empty.
fn detach<K>(map: &DashMap<K, Vec<String>>, key: &K, session_id: &str) -> bool
where
    K: std::hash::Hash + Eq,
{
    let emptied = match map.get_mut(key) {
        Some(mut ids) => {
            ids.retain(|s| s != session_id);
            ids.is_empty()
        }
        None => false,
    };
    if emptied {
        map.remove_if(key, |_, ids| ids.is_empty());
    }
    emptied
}
