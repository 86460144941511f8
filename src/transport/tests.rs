use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;

use super::message::{ClientMessage, ServerMessage};
use super::{BackendCall, Connector, MemoryBackend, TransportEvent, WsConnector};
use crate::broker::{Engine, Message, PubSubEngine};
use crate::config::PublishMode;
use crate::persistence::Store;
use crate::server::{ServerState, serve};
use crate::utils::TransportError;

async fn start_backend() -> (String, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::new(Store::temporary().unwrap()));
    tokio::spawn(serve(listener, state.clone()));
    (format!("ws://{addr}"), state)
}

async fn next_event(events: &mut tokio::sync::mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out")
        .expect("event queue closed")
}

#[test]
fn test_client_message_format() {
    let msg = ClientMessage::Set {
        id: 1,
        key: "t".to_string(),
        value: "v".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({"type": "set", "id": 1, "key": "t", "value": "v"})
    );

    let parsed: ClientMessage =
        serde_json::from_value(json!({"type": "subscribe", "topic": "news"})).unwrap();
    assert_eq!(
        parsed,
        ClientMessage::Subscribe {
            topic: "news".to_string()
        }
    );
}

#[test]
fn test_server_message_format() {
    let parsed: ServerMessage =
        serde_json::from_value(json!({"type": "value", "id": 4, "value": null})).unwrap();
    assert_eq!(parsed, ServerMessage::Value { id: 4, value: None });

    let push = ServerMessage::Message {
        topic: "t".to_string(),
        value: "{}".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&push).unwrap(),
        json!({"type": "message", "topic": "t", "value": "{}"})
    );
}

#[tokio::test]
async fn test_memory_backend_set_get_publish() {
    let backend = MemoryBackend::new();
    let commands = backend.connect_commands().await.unwrap();
    let mut listener = backend.connect_listener().await.unwrap();

    listener.connection.subscribe("t");
    commands.set("t", "v1").await.unwrap();
    assert_eq!(commands.get("t").await.unwrap().as_deref(), Some("v1"));
    assert_eq!(commands.get("missing").await.unwrap(), None);

    commands.publish("t", "v1").await.unwrap();
    commands.publish("other", "ignored").await.unwrap();

    match next_event(&mut listener.events).await {
        TransportEvent::Message { topic, payload } => {
            assert_eq!(topic, "t");
            assert_eq!(payload, "v1");
        }
        other => panic!("Expected a message, got {other:?}"),
    }
    assert!(listener.events.try_recv().is_err());
    assert_eq!(backend.count(&BackendCall::Subscribe("t".into())), 1);
}

#[tokio::test]
async fn test_memory_backend_disconnect() {
    let backend = MemoryBackend::new();
    let commands = backend.connect_commands().await.unwrap();
    let mut listener = backend.connect_listener().await.unwrap();

    backend.disconnect();
    assert!(matches!(
        commands.set("t", "v").await,
        Err(TransportError::Disconnected)
    ));
    assert!(matches!(
        next_event(&mut listener.events).await,
        TransportEvent::Error(TransportError::Disconnected)
    ));
    assert!(backend.connect_commands().await.is_err());

    backend.reconnect();
    commands.set("t", "v").await.unwrap();
}

#[tokio::test]
async fn test_memory_listener_drop_unregisters() {
    let backend = MemoryBackend::new();
    let listener = backend.connect_listener().await.unwrap();
    listener.connection.subscribe("t");
    assert_eq!(backend.listeners_on("t"), 1);

    drop(listener);
    assert_eq!(backend.listeners_on("t"), 0);
}

#[tokio::test]
async fn test_websocket_commands_round_trip() {
    let (url, state) = start_backend().await;
    let connector = WsConnector::new(url);
    let commands = connector.connect_commands().await.unwrap();

    assert_eq!(commands.get("t").await.unwrap(), None);
    commands.set("t", "v1").await.unwrap();
    assert_eq!(commands.get("t").await.unwrap().as_deref(), Some("v1"));
    commands.publish("t", "v1").await.unwrap();

    assert_eq!(state.store.get("t").unwrap().as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_websocket_listener_receives_pushes() {
    let (url, state) = start_backend().await;
    let connector = WsConnector::new(url);
    let commands = connector.connect_commands().await.unwrap();
    let mut listener = connector.connect_listener().await.unwrap();

    listener.connection.subscribe("t");
    // registration is fire-and-forget; wait until the server has it
    timeout(Duration::from_secs(2), async {
        while !state.hub.lock().topics.contains_key("t") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription never registered");

    commands.publish("t", "hello").await.unwrap();
    match next_event(&mut listener.events).await {
        TransportEvent::Message { topic, payload } => {
            assert_eq!(topic, "t");
            assert_eq!(payload, "hello");
        }
        other => panic!("Expected a message, got {other:?}"),
    }

    listener.connection.unsubscribe("t");
    timeout(Duration::from_secs(2), async {
        while state.hub.lock().topics.contains_key("t") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("unsubscription never registered");
}

#[tokio::test]
async fn test_websocket_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = WsConnector::new(format!("ws://{addr}"));
    assert!(connector.connect_commands().await.is_err());
}

#[tokio::test]
async fn test_engines_over_websocket_backend() {
    let (url, _state) = start_backend().await;
    let connector = WsConnector::new(url);
    let producer = Engine::connect(&connector, PublishMode::Acknowledged)
        .await
        .unwrap();
    let consumer = Engine::connect(&connector, PublishMode::Acknowledged)
        .await
        .unwrap();

    producer
        .publish("prices", Message::new(100, "a"))
        .await
        .unwrap();

    let mut stream = consumer.stream("prices");
    let first = timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out");
    assert_eq!(first, Some(Message::new(100, "a")));

    // wait for the listener registration before relying on pushes
    tokio::time::sleep(Duration::from_millis(50)).await;

    producer
        .publish("prices", Message::new(90, "stale"))
        .await
        .unwrap();
    producer
        .publish("prices", Message::new(200, "c"))
        .await
        .unwrap();

    let next = timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out");
    assert_eq!(next, Some(Message::new(200, "c")));
    assert_eq!(consumer.latest("prices"), Some(Message::new(200, "c")));
}
