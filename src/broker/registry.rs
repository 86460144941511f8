//! Channel registry and subscription table.
//!
//! `Registry` is the single owned piece of mutable state behind an engine. It
//! is deliberately synchronous and free of I/O: operations report what
//! happened (a channel was created, a channel was released) and the engine
//! turns those outcomes into transport calls. That keeps every invariant
//! checkable without a backend.

use std::collections::HashMap;

use crate::broker::channel::{Channel, Handler, SubscriptionId};
use crate::broker::message::Message;

/// An active subscription: which topic it watches and the handler it registered.
#[derive(Clone)]
pub struct Subscription {
    pub topic: String,
    pub handler: Handler,
}

/// Outcome of `Registry::subscribe`.
#[derive(Debug)]
pub struct Subscribed {
    pub id: SubscriptionId,
    /// The channel did not exist before this call; the caller owes the
    /// backend a subscribe and an initial `get`.
    pub created: bool,
    /// Value the new handler must receive before `subscribe` returns.
    pub replay: Option<Message>,
}

#[derive(Default)]
pub struct Registry {
    channels: HashMap<String, Channel>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_id: SubscriptionId,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel for `topic`, creating an empty one if needed.
    /// The flag is true when the channel was created by this call.
    pub fn get_or_create(&mut self, topic: &str) -> (&mut Channel, bool) {
        let created = !self.channels.contains_key(topic);
        let channel = self
            .channels
            .entry(topic.to_string())
            .or_insert_with(|| Channel::new(topic));
        (channel, created)
    }

    /// Registers `handler` on `topic` under a fresh handle.
    pub fn subscribe(&mut self, topic: &str, handler: Handler) -> Subscribed {
        let id = self.next_id;
        self.next_id += 1;

        let (channel, created) = self.get_or_create(topic);
        channel.subscribe(id, handler.clone());
        let replay = channel.last_message.clone();

        self.subscriptions.insert(
            id,
            Subscription {
                topic: topic.to_string(),
                handler,
            },
        );

        Subscribed {
            id,
            created,
            replay,
        }
    }

    /// Removes subscription `id`. Returns the topic whose channel was
    /// released as a consequence, if any. Unknown handles are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<String> {
        let subscription = self.subscriptions.remove(&id)?;
        let channel = self.channels.get_mut(&subscription.topic)?;
        if !channel.unsubscribe(id) {
            return None;
        }
        if self.release(&subscription.topic) {
            Some(subscription.topic)
        } else {
            None
        }
    }

    /// Drops the channel for `topic` once it has no subscribers left.
    /// Returns true when the channel was removed. Missing topics are a no-op.
    pub fn release(&mut self, topic: &str) -> bool {
        match self.channels.get(topic) {
            Some(channel) if channel.is_empty() => {
                self.channels.remove(topic);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, topic: &str) -> Option<&Channel> {
        self.channels.get(topic)
    }

    /// Applies the freshness test for an incoming message. On acceptance
    /// returns the handlers to notify, in registration order.
    pub fn accept(
        &mut self,
        topic: &str,
        message: &Message,
    ) -> Option<Vec<(SubscriptionId, Handler)>> {
        let channel = self.channels.get_mut(topic)?;
        if channel.offer(message) {
            Some(channel.handlers())
        } else {
            None
        }
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    #[cfg(test)]
    pub(crate) fn subscription(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    /// Number of active handles watching `topic`.
    pub fn active_handles(&self, topic: &str) -> usize {
        self.subscriptions
            .values()
            .filter(|sub| sub.topic == topic)
            .count()
    }

    #[cfg(test)]
    pub(crate) fn topics(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
