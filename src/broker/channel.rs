use std::fmt;
use std::sync::Arc;

use crate::broker::message::Message;

/// Opaque subscription handle. Allocated from a monotonically increasing
/// counter and never reused within a process.
pub type SubscriptionId = u64;

/// Callback invoked with every accepted message of a topic.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Local state of one topic that has at least one subscriber.
///
/// A channel remembers the freshest message it has accepted and the handlers
/// registered on it, in subscription order. The subscriber count is the
/// length of that handler list, so the two can never disagree.
pub struct Channel {
    pub topic: String,
    pub last_message: Option<Message>,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl Channel {
    /// Creates an empty channel for `topic`.
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            last_message: None,
            handlers: Vec::new(),
        }
    }

    /// Appends a handler; it will be invoked after every handler already present.
    pub fn subscribe(&mut self, id: SubscriptionId, handler: Handler) {
        self.handlers.push((id, handler));
    }

    /// Removes the handler registered under `id`.
    /// Returns false when no such handler exists.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.handlers.iter().position(|(sub, _)| *sub == id) {
            Some(idx) => {
                self.handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.handlers.iter().any(|(sub, _)| *sub == id)
    }

    /// Freshness test. Stores `message` and returns true iff nothing has been
    /// accepted yet or `message` is strictly newer than the stored one.
    pub fn offer(&mut self, message: &Message) -> bool {
        let fresh = match &self.last_message {
            Some(current) => message.is_newer_than(current),
            None => true,
        };
        if fresh {
            self.last_message = Some(message.clone());
        }
        fresh
    }

    /// Snapshot of the current handlers in registration order.
    pub fn handlers(&self) -> Vec<(SubscriptionId, Handler)> {
        self.handlers.clone()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("topic", &self.topic)
            .field("subscribers", &self.handlers.len())
            .field("last_message", &self.last_message)
            .finish()
    }
}
