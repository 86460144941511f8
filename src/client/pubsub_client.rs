use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::message::ServerMessage;

pub type ClientId = String;

/// The server's record of one accepted WebSocket connection.
///
/// The hub addresses replies and topic announcements to a connection through
/// its id; frames queued on `sender` are written out by the connection's
/// send loop.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: ClientId,

    /// Channel drained by the connection's writer task.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
        }
    }

    /// Queue `msg` for delivery. Returns false if the connection is gone.
    pub fn send(&self, msg: &ServerMessage) -> bool {
        let text = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize frame for {}: {e}", self.id);
                return false;
            }
        };
        self.sender.send(WsMessage::text(text)).is_ok()
    }
}
