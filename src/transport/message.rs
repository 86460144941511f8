//! Backend wire protocol.
//!
//! Frames are JSON text messages tagged by `type`. Requests that expect an
//! answer carry an `id` which the server echoes back; `subscribe` and
//! `unsubscribe` are fire-and-forget. Pushes for subscribed topics arrive as
//! `message` frames.

use serde::{Deserialize, Serialize};

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "set")]
    Set {
        id: RequestId,
        key: String,
        value: String,
    },
    #[serde(rename = "get")]
    Get { id: RequestId, key: String },
    #[serde(rename = "publish")]
    Publish {
        id: RequestId,
        topic: String,
        value: String,
    },
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ok")]
    Ok { id: RequestId },
    #[serde(rename = "value")]
    Value {
        id: RequestId,
        value: Option<String>,
    },
    #[serde(rename = "error")]
    Error {
        id: Option<RequestId>,
        message: String,
    },
    #[serde(rename = "message")]
    Message { topic: String, value: String },
}
