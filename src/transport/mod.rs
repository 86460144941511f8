//! The `transport` module is the boundary to the shared key-value/pub-sub
//! backend.
//!
//! An engine needs two independent connections:
//!
//! - a command connection for request/response calls (`set`, `get`, `publish`)
//! - a listener connection that only registers interest in topics and
//!   delivers pushes, since a connection streaming pushes cannot also serve
//!   requests
//!
//! Pushes and connection errors arrive on the listener's event queue. Two
//! backends are provided: an in-process `memory` backend and a `websocket`
//! client for the `lastsub server` backend.

pub mod memory;
pub mod message;
pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::utils::TransportError;

pub use memory::{BackendCall, MemoryBackend};
pub use websocket::WsConnector;

/// Something the listener connection observed.
#[derive(Debug)]
pub enum TransportEvent {
    /// A value announced on a subscribed topic, still encoded.
    Message { topic: String, payload: String },
    /// The connection reported a failure. Reconnecting is up to the backend client.
    Error(TransportError),
}

/// Request/response half of a backend.
#[async_trait]
pub trait CommandConnection: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), TransportError>;
    async fn get(&self, key: &str) -> Result<Option<String>, TransportError>;
    async fn publish(&self, topic: &str, value: &str) -> Result<(), TransportError>;
}

/// Push half of a backend. Registration is fire-and-forget; failures show up
/// as `TransportEvent::Error` on the event queue.
pub trait ListenerConnection: Send + Sync {
    fn subscribe(&self, topic: &str);
    fn unsubscribe(&self, topic: &str);
}

/// A connected listener and the queue its pushes are delivered on.
pub struct Listener {
    pub connection: Box<dyn ListenerConnection>,
    pub events: UnboundedReceiver<TransportEvent>,
}

/// Opens the two connections an engine runs on.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect_commands(&self) -> Result<Arc<dyn CommandConnection>, TransportError>;
    async fn connect_listener(&self) -> Result<Listener, TransportError>;
}

#[cfg(test)]
mod tests;
