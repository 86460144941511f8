use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::{Client, ClientId};
use crate::server::topic::Topic;
use crate::transport::message::ServerMessage;

/// Topic fan-out of the backend server.
///
/// Tracks connected clients and which topics each of them listens to. An
/// announce reaches the clients subscribed at that moment; nothing is
/// buffered for later subscribers, which is what the stored latest value is for.
/// The hub is synchronous and meant to sit behind a lock owned by the server.
#[derive(Debug, Default)]
pub struct Hub {
    pub topics: HashMap<String, Topic>,
    pub clients: HashMap<ClientId, Client>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.clients.remove(client_id);
    }

    /// Subscribes a client to a topic. Automatically creates the topic if it doesn't exist.
    /// Clients that are not registered (or were already cleaned up) are ignored.
    pub fn subscribe(&mut self, topic: &str, subscriber: ClientId) {
        if !self.clients.contains_key(&subscriber) {
            warn!("Ignoring subscribe to '{topic}' from unknown client {subscriber}");
            return;
        }

        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber);
    }

    /// Unsubscribes a client from a topic; topics left without subscribers are dropped.
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &ClientId) {
        if let Some(t) = self.topics.get_mut(topic) {
            t.unsubscribe(subscriber);
            if t.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    /// Announces `value` to every client subscribed to `topic`.
    /// Returns the number of clients it was queued for.
    pub fn publish(&self, topic: &str, value: &str) -> usize {
        let Some(t) = self.topics.get(topic) else {
            debug!("No subscribers for topic '{topic}'");
            return 0;
        };

        let frame = ServerMessage::Message {
            topic: topic.to_string(),
            value: value.to_string(),
        };

        let mut delivered = 0;
        for sub_id in &t.subscribers {
            match self.clients.get(sub_id) {
                Some(client) if client.send(&frame) => delivered += 1,
                Some(_) => warn!("Failed to send to {sub_id}"),
                None => warn!("No client registered with id: {sub_id}"),
            }
        }
        delivered
    }

    /// Removes a client and all of its topic subscriptions.
    pub fn cleanup_client(&mut self, client_id: &ClientId) {
        self.remove_client(client_id);

        self.topics.retain(|_, t| {
            t.unsubscribe(client_id);
            !t.is_empty()
        });

        debug!("Cleaned up client {client_id}");
    }
}
