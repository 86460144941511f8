use super::pubsub_client::Client;
use crate::transport::message::ServerMessage;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    assert!(client.id.starts_with("client-"));
}

#[test]
fn test_client_ids_are_unique() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let a = Client::new(tx.clone());
    let b = Client::new(tx);
    assert_ne!(a.id, b.id);
}

#[test]
fn test_send_serializes_frame() {
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);

    assert!(client.send(&ServerMessage::Ok { id: 7 }));

    match rx.try_recv().unwrap() {
        WsMessage::Text(text) => {
            let frame: ServerMessage = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(frame, ServerMessage::Ok { id: 7 });
        }
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_send_to_closed_connection() {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    drop(rx);
    assert!(!client.send(&ServerMessage::Ok { id: 1 }));
}
