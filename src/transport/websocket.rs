//! WebSocket backend client
//!
//! Connects to a `lastsub server` backend. Each connection is split into a
//! writer task, fed through an unbounded channel, and a reader task:
//! - on the command connection the reader matches `ok`/`value`/`error`
//!   replies to waiting requests by request id
//! - on the listener connection the reader forwards `message` pushes and
//!   connection failures to the event queue

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::transport::message::{ClientMessage, RequestId, ServerMessage};
use crate::transport::{CommandConnection, Connector, Listener, ListenerConnection, TransportEvent};
use crate::utils::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = Result<Option<String>, TransportError>;

/// Opens command and listener connections against a backend URL such as
/// `ws://127.0.0.1:8080`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect_commands(&self) -> Result<Arc<dyn CommandConnection>, TransportError> {
        Ok(Arc::new(WsCommands::connect(&self.url).await?))
    }

    async fn connect_listener(&self) -> Result<Listener, TransportError> {
        WsListener::connect(&self.url).await
    }
}

async fn open(url: &str) -> Result<(mpsc::UnboundedSender<WsMessage>, SplitStream<WsStream>), TransportError> {
    let (ws_stream, _response) = connect_async(url).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    tokio::spawn(write_loop(ws_sender, rx));
    Ok((tx, ws_receiver))
}

async fn write_loop(
    mut ws_sender: SplitSink<WsStream, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<WsMessage>,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = ws_sender.send(msg).await {
            warn!("Failed to write to backend: {e}");
            return;
        }
    }
    let _ = ws_sender.close().await;
}

fn send_frame(
    outbound: &mpsc::UnboundedSender<WsMessage>,
    msg: &ClientMessage,
) -> Result<(), TransportError> {
    let text = serde_json::to_string(msg)?;
    outbound
        .send(WsMessage::text(text))
        .map_err(|_| TransportError::Disconnected)
}

struct WsCommands {
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>>,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl WsCommands {
    async fn connect(url: &str) -> Result<Self, TransportError> {
        let (outbound, mut ws_receiver) = open(url).await?;
        let pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        {
            let pending = pending.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                while let Some(frame) = ws_receiver.next().await {
                    match frame {
                        Ok(WsMessage::Text(text)) => {
                            match serde_json::from_str::<ServerMessage>(text.as_str()) {
                                Ok(reply) => resolve(&pending, reply),
                                Err(e) => warn!("Invalid backend reply: {e}"),
                            }
                        }
                        Ok(WsMessage::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            error!("Command connection failed: {e}");
                            break;
                        }
                    }
                }

                closed.store(true, Ordering::SeqCst);
                for (_, waiter) in pending.lock().drain() {
                    let _ = waiter.send(Err(TransportError::Disconnected));
                }
                debug!("Command connection closed");
            });
        }

        Ok(Self {
            outbound,
            pending,
            closed,
            next_id: AtomicU64::new(0),
        })
    }

    fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, id: RequestId, msg: ClientMessage) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(TransportError::Disconnected);
        }
        if let Err(e) = send_frame(&self.outbound, &msg) {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| TransportError::Disconnected)?
    }
}

fn resolve(pending: &Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>, reply: ServerMessage) {
    let (id, outcome) = match reply {
        ServerMessage::Ok { id } => (id, Ok(None)),
        ServerMessage::Value { id, value } => (id, Ok(value)),
        ServerMessage::Error {
            id: Some(id),
            message,
        } => (id, Err(TransportError::Backend(message))),
        ServerMessage::Error { id: None, message } => {
            warn!("Backend error: {message}");
            return;
        }
        ServerMessage::Message { topic, .. } => {
            debug!("Ignoring push for {topic} on command connection");
            return;
        }
    };

    match pending.lock().remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(outcome);
        }
        None => warn!("Reply for unknown request {id}"),
    }
}

#[async_trait]
impl CommandConnection for WsCommands {
    async fn set(&self, key: &str, value: &str) -> Result<(), TransportError> {
        let id = self.next_id();
        let msg = ClientMessage::Set {
            id,
            key: key.to_string(),
            value: value.to_string(),
        };
        self.request(id, msg).await.map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TransportError> {
        let id = self.next_id();
        let msg = ClientMessage::Get {
            id,
            key: key.to_string(),
        };
        self.request(id, msg).await
    }

    async fn publish(&self, topic: &str, value: &str) -> Result<(), TransportError> {
        let id = self.next_id();
        let msg = ClientMessage::Publish {
            id,
            topic: topic.to_string(),
            value: value.to_string(),
        };
        self.request(id, msg).await.map(|_| ())
    }
}

struct WsListener {
    outbound: mpsc::UnboundedSender<WsMessage>,
}

impl WsListener {
    async fn connect(url: &str) -> Result<Listener, TransportError> {
        let (outbound, mut ws_receiver) = open(url).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                let event = match frame {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(ServerMessage::Message { topic, value }) => TransportEvent::Message {
                                topic,
                                payload: value,
                            },
                            Ok(ServerMessage::Error { message, .. }) => {
                                TransportEvent::Error(TransportError::Backend(message))
                            }
                            Ok(other) => {
                                debug!("Ignoring {other:?} on listener connection");
                                continue;
                            }
                            Err(e) => TransportEvent::Error(TransportError::Protocol(e.to_string())),
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = events_tx.send(TransportEvent::Error(e.into()));
                        break;
                    }
                };
                if events_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = events_tx.send(TransportEvent::Error(TransportError::Disconnected));
        });

        Ok(Listener {
            connection: Box::new(WsListener { outbound }),
            events: events_rx,
        })
    }

    fn send(&self, msg: ClientMessage) {
        if let Err(e) = send_frame(&self.outbound, &msg) {
            warn!("Listener registration not sent: {e}");
        }
    }
}

impl ListenerConnection for WsListener {
    fn subscribe(&self, topic: &str) {
        self.send(ClientMessage::Subscribe {
            topic: topic.to_string(),
        });
    }

    fn unsubscribe(&self, topic: &str) {
        self.send(ClientMessage::Unsubscribe {
            topic: topic.to_string(),
        });
    }
}
