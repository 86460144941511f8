use std::collections::HashSet;

use crate::client::ClientId;

/// Connections subscribed to one topic on the backend server.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashSet<ClientId>,
}

impl Topic {
    /// Creates a new instance of the Topic with the given name
    /// Initializes an empty set of subscribers
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    /// Subscribing twice has no further effect.
    pub fn subscribe(&mut self, id: ClientId) {
        self.subscribers.insert(id);
    }

    pub fn unsubscribe(&mut self, id: &ClientId) {
        self.subscribers.remove(id);
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
