//! The `error` module defines the error types used across `lastsub`.
//!
//! Errors are grouped by the layer that produces them: the backend transport,
//! payload decoding, the engine facade, and the backend server.

use thiserror::Error;

/// Failures of a backend connection (either the command or the listener side).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("backend connection closed")]
    Disconnected,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("backend rejected request: {0}")]
    Backend(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A payload read from the backend could not be turned into a `Message`.
#[derive(Debug, Error)]
#[error("malformed message payload: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Errors returned to callers of the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// Errors raised by the latest-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
}

/// Errors raised while running the backend server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}
