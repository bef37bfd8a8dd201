//! Envelope Wire Format
//!
//! Every published payload travels as one JSON object holding the payload's
//! own fields plus two system fields:
//!
//! ```json
//! {"type": "notification", "text": "hi", "originInstanceId": "inst-2", "timestamp": 1718000000000}
//! ```
//!
//! Payloads that are not JSON objects are carried under a `data` key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::instance::InstanceId;

pub const ORIGIN_FIELD: &str = "originInstanceId";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const DATA_FIELD: &str = "data";
pub const TYPE_FIELD: &str = "type";

/// Envelope decoding errors
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Payload could not be serialized: {0}")]
    Payload(serde_json::Error),
}

/// A published message as it travels between instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub origin_instance_id: String,
    pub timestamp: i64,
}

impl Envelope {
    /// Wrap a payload with origin and timestamp metadata.
    pub fn wrap(origin: &InstanceId, payload: Value, timestamp: i64) -> Self {
        let mut payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(DATA_FIELD.to_string(), other);
                map
            }
        };
        payload.remove(ORIGIN_FIELD);
        payload.remove(TIMESTAMP_FIELD);

        Self {
            payload,
            origin_instance_id: origin.as_str().to_string(),
            timestamp,
        }
    }

    /// Serialize a typed payload and wrap it.
    pub fn from_serializable<T: Serialize + ?Sized>(
        origin: &InstanceId,
        payload: &T,
        timestamp: i64,
    ) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_value(payload).map_err(EnvelopeError::Payload)?;
        Ok(Self::wrap(origin, value, timestamp))
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Payload)
    }

    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether this envelope was published by `instance`.
    pub fn is_from(&self, instance: &InstanceId) -> bool {
        self.origin_instance_id == instance.as_str()
    }

    /// The payload's `type` field, when it is a string.
    pub fn payload_type(&self) -> Option<&str> {
        self.payload.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// The payload without system fields.
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Payload plus system fields, as seen on the wire.
    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert(
            ORIGIN_FIELD.to_string(),
            Value::String(self.origin_instance_id.clone()),
        );
        map.insert(TIMESTAMP_FIELD.to_string(), Value::from(self.timestamp));
        Value::Object(map)
    }
}
