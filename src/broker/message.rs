use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::DecodeError;

/// A value published to a topic, stamped with the time it was produced.
///
/// The same JSON encoding is used both as the persisted "latest value" of a
/// topic and as the body of announcements on the backend, so a value read by
/// `get` and a value received as a push compare equal.
///
/// # Fields
///
/// - `timestamp` - Milliseconds since the UNIX epoch. Freshness is decided by
///   this field alone.
/// - `payload` - Arbitrary JSON content.
///
/// # Example
///
/// ```rust
/// use lastsub::broker::Message;
///
/// let msg = Message::new(1_725_000_000_000, "hello");
/// let raw = msg.encode().unwrap();
/// assert_eq!(Message::decode(&raw).unwrap(), msg);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: i64,
    pub payload: Value,
}

impl Message {
    pub fn new(timestamp: i64, payload: impl Into<Value>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
        }
    }

    /// Stamps `payload` with the current wall-clock time.
    pub fn now(payload: impl Into<Value>) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), payload)
    }

    /// Strictly-greater comparison; equal timestamps are not newer.
    pub fn is_newer_than(&self, other: &Message) -> bool {
        self.timestamp > other.timestamp
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}
