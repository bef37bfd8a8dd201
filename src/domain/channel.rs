//! Broadcast Channels
//!
//! A channel is a string key naming a broadcast group. Two conventions are
//! layered on top of free-form names:
//!
//! ```text
//! chat:{chat_type}:{chatroom_id}   e.g. chat:dm:1
//! user:{user_id}                   e.g. user:42
//! ```
//!
//! On the broker every name is prefixed with the relay namespace so unrelated
//! traffic sharing the same Redis instance never collides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const CHAT_PREFIX: &str = "chat:";
const USER_PREFIX: &str = "user:";

/// Channel validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel name must not be empty")]
    Empty,

    #[error("Channel name must not contain whitespace: {0:?}")]
    Whitespace(String),

    #[error("Unknown chat type: {0}")]
    UnknownChatType(String),
}

/// Kind of chatroom a chat channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-to-one conversation
    Dm,
    /// Group conversation between connected users
    Group,
    /// Chatroom attached to an event
    Event,
    /// Chatroom attached to a quick meetup
    Meetup,
    /// City-wide chatroom
    City,
}

impl ChatType {
    pub const ALL: [ChatType; 5] = [
        ChatType::Dm,
        ChatType::Group,
        ChatType::Event,
        ChatType::Meetup,
        ChatType::City,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Dm => "dm",
            ChatType::Group => "group",
            ChatType::Event => "event",
            ChatType::Meetup => "meetup",
            ChatType::City => "city",
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatType {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ChannelError::UnknownChatType(s.to_string()))
    }
}

/// What a channel name addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScope {
    Chatroom { chat_type: ChatType, chatroom_id: i64 },
    User { user_id: i64 },
    Custom,
}

/// A validated channel name (without the broker namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(String);

impl Channel {
    /// Create a channel from an arbitrary name.
    pub fn new(name: impl Into<String>) -> Result<Self, ChannelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ChannelError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ChannelError::Whitespace(name));
        }
        Ok(Self(name))
    }

    /// Channel for every participant of a chatroom.
    pub fn chatroom(chat_type: ChatType, chatroom_id: i64) -> Self {
        Self(format!("{}{}:{}", CHAT_PREFIX, chat_type, chatroom_id))
    }

    /// Channel for every session of one user.
    pub fn user(user_id: i64) -> Self {
        Self(format!("{}{}", USER_PREFIX, user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the channel by its naming convention.
    pub fn scope(&self) -> ChannelScope {
        if let Some(rest) = self.0.strip_prefix(CHAT_PREFIX) {
            if let Some((chat_type, id)) = rest.split_once(':') {
                if let (Ok(chat_type), Ok(chatroom_id)) = (chat_type.parse(), id.parse()) {
                    return ChannelScope::Chatroom {
                        chat_type,
                        chatroom_id,
                    };
                }
            }
        } else if let Some(id) = self.0.strip_prefix(USER_PREFIX) {
            if let Ok(user_id) = id.parse() {
                return ChannelScope::User { user_id };
            }
        }
        ChannelScope::Custom
    }

    /// Name used on the broker.
    pub fn broker_name(&self, namespace: &str) -> String {
        format!("{}{}", namespace, self.0)
    }

    /// Recover a channel from a broker name; `None` for foreign traffic.
    pub fn from_broker_name(namespace: &str, broker_name: &str) -> Option<Self> {
        broker_name
            .strip_prefix(namespace)
            .and_then(|name| Self::new(name).ok())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
