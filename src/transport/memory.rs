//! In-process backend.
//!
//! `MemoryBackend` behaves like a small Redis: a latest-value map plus topic
//! announcements delivered to every listener connection subscribed at the
//! time of the publish. Every call is recorded so callers can assert on the
//! traffic an engine produced. `disconnect` simulates a connection loss.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::trace;

use crate::transport::{CommandConnection, Connector, Listener, ListenerConnection, TransportEvent};
use crate::utils::TransportError;

/// A request observed by the backend, keyed by topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Set(String),
    Get(String),
    Publish(String),
    Subscribe(String),
    Unsubscribe(String),
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    values: HashMap<String, String>,
    listeners: HashMap<u64, Slot>,
    next_listener: u64,
    offline: bool,
    calls: Vec<BackendCall>,
}

struct Slot {
    topics: HashSet<String>,
    events: UnboundedSender<TransportEvent>,
}

impl State {
    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline {
            Err(TransportError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn announce(&self, topic: &str, payload: &str) -> usize {
        let mut delivered = 0;
        for slot in self.listeners.values() {
            if slot.topics.contains(topic) {
                let event = TransportEvent::Message {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                };
                if slot.events.send(event).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stored value for `key`, bypassing the call log.
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    /// How many times `call` has been observed.
    pub fn count(&self, call: &BackendCall) -> usize {
        self.inner.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Number of listener connections currently subscribed to `topic`.
    pub fn listeners_on(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .values()
            .filter(|slot| slot.topics.contains(topic))
            .count()
    }

    /// Delivers `payload` to subscribers of `topic` without storing it.
    pub fn push_raw(&self, topic: &str, payload: &str) -> usize {
        self.inner.lock().announce(topic, payload)
    }

    /// Makes every command fail and reports the loss on all listeners.
    pub fn disconnect(&self) {
        let mut state = self.inner.lock();
        state.offline = true;
        for slot in state.listeners.values() {
            let _ = slot
                .events
                .send(TransportEvent::Error(TransportError::Disconnected));
        }
    }

    pub fn reconnect(&self) {
        self.inner.lock().offline = false;
    }
}

#[async_trait]
impl Connector for MemoryBackend {
    async fn connect_commands(&self) -> Result<Arc<dyn CommandConnection>, TransportError> {
        self.inner.lock().check_online()?;
        Ok(Arc::new(MemoryCommands {
            backend: self.clone(),
        }))
    }

    async fn connect_listener(&self) -> Result<Listener, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        state.check_online()?;
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.insert(
            id,
            Slot {
                topics: HashSet::new(),
                events: tx,
            },
        );
        Ok(Listener {
            connection: Box::new(MemoryListener {
                backend: self.clone(),
                id,
            }),
            events: rx,
        })
    }
}

struct MemoryCommands {
    backend: MemoryBackend,
}

#[async_trait]
impl CommandConnection for MemoryCommands {
    async fn set(&self, key: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.backend.inner.lock();
        state.check_online()?;
        state.calls.push(BackendCall::Set(key.to_string()));
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TransportError> {
        let mut state = self.backend.inner.lock();
        state.check_online()?;
        state.calls.push(BackendCall::Get(key.to_string()));
        Ok(state.values.get(key).cloned())
    }

    async fn publish(&self, topic: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.backend.inner.lock();
        state.check_online()?;
        state.calls.push(BackendCall::Publish(topic.to_string()));
        let delivered = state.announce(topic, value);
        trace!(topic, delivered, "memory backend announced value");
        Ok(())
    }
}

struct MemoryListener {
    backend: MemoryBackend,
    id: u64,
}

impl ListenerConnection for MemoryListener {
    fn subscribe(&self, topic: &str) {
        let mut state = self.backend.inner.lock();
        state.calls.push(BackendCall::Subscribe(topic.to_string()));
        if let Some(slot) = state.listeners.get_mut(&self.id) {
            slot.topics.insert(topic.to_string());
        }
    }

    fn unsubscribe(&self, topic: &str) {
        let mut state = self.backend.inner.lock();
        state.calls.push(BackendCall::Unsubscribe(topic.to_string()));
        if let Some(slot) = state.listeners.get_mut(&self.id) {
            slot.topics.remove(topic);
        }
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.backend.inner.lock().listeners.remove(&self.id);
    }
}
