//! WebSocket backend server
//!
//! Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Create a `Client` for each connection and register it with the `Hub`
//! - Answer `set`/`get`/`publish` requests against the latest-value store
//!   and the hub, echoing the request id
//! - Record `subscribe`/`unsubscribe` registrations (no reply)
//! - Remove the client and its subscriptions once the connection ends

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::{Client, ClientId};
use crate::server::ServerState;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::ServerError;

/// Binds `addr` and serves connections until the listener fails.
pub async fn start_websocket_server(addr: &str, state: Arc<ServerState>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!("Backend listening on ws://{addr}");
    serve(listener, state).await;
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Accepted connection from {peer}");
                spawn(handle_connection(stream, state.clone()));
            }
            Err(e) => {
                error!("Accept failed: {e}");
                return;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    let client_id = client.id.clone();
    state.hub.lock().register_client(client);

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let state = state.clone();
        let client_id = client_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                state.hub.lock().cleanup_client(&client_id);
            }
        }
    };

    {
        let client_id = client_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }

            do_cleanup();
            debug!("Send loop closed for {client_id}");
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if cleanup_called.load(Ordering::SeqCst) {
            debug!("Send loop for {client_id} already closed; dropping connection");
            break;
        }

        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => handle_request(&state, &client_id, request),
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    text.as_str().chars().take(100).collect::<String>()
                );
                Some(ServerMessage::Error {
                    id: None,
                    message: format!("invalid message: {err}"),
                })
            }
        };

        if let Some(reply) = reply {
            let hub = state.hub.lock();
            if let Some(client) = hub.clients.get(&client_id) {
                client.send(&reply);
            }
        }
    }

    debug!("{client_id} disconnected");
    do_cleanup();
}

/// Applies one request from `client_id` and returns the reply to send, if any.
pub fn handle_request(
    state: &ServerState,
    client_id: &ClientId,
    request: ClientMessage,
) -> Option<ServerMessage> {
    match request {
        ClientMessage::Set { id, key, value } => Some(match state.store.set(&key, &value) {
            Ok(()) => ServerMessage::Ok { id },
            Err(e) => {
                error!("Failed to store value for '{key}': {e}");
                ServerMessage::Error {
                    id: Some(id),
                    message: e.to_string(),
                }
            }
        }),
        ClientMessage::Get { id, key } => Some(match state.store.get(&key) {
            Ok(value) => ServerMessage::Value { id, value },
            Err(e) => {
                error!("Failed to read value for '{key}': {e}");
                ServerMessage::Error {
                    id: Some(id),
                    message: e.to_string(),
                }
            }
        }),
        ClientMessage::Publish { id, topic, value } => {
            let delivered = state.hub.lock().publish(&topic, &value);
            debug!("{client_id} published to {topic} ({delivered} receivers)");
            Some(ServerMessage::Ok { id })
        }
        ClientMessage::Subscribe { topic } => {
            state.hub.lock().subscribe(&topic, client_id.clone());
            debug!("{client_id} subscribed to {topic}");
            None
        }
        ClientMessage::Unsubscribe { topic } => {
            state.hub.lock().unsubscribe(&topic, client_id);
            debug!("{client_id} unsubscribed from {topic}");
            None
        }
    }
}
