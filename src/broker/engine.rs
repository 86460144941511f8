//! Broker engine
//!
//! `Engine` multiplexes any number of local subscribers per topic over two
//! backend connections and gives every topic "last known value" semantics:
//! - subscribing to a topic that already holds a value delivers that value to
//!   the new handler before `subscribe` returns
//! - the backend subscription for a topic exists only while at least one
//!   local handler watches it; creating a channel also fetches the topic's
//!   persisted value with a one-shot `get`
//! - every incoming value, whether pushed or fetched, passes a freshness test
//!   (strictly newer timestamp) before it is fanned out
//!
//! Concurrency notes:
//! - Registry state sits behind a single mutex that is never held while a
//!   handler runs.
//! - Fan-out passes (pushes, fetched values, subscribe-time replay) and
//!   unsubscribes are serialized by a re-entrant delivery lock, so handlers
//!   observe values in acceptance order while still being allowed to call back
//!   into the engine.
//! - Pushes and fetch requests are handled by a dispatcher task spawned on the
//!   Tokio runtime the engine was created on. The task stops once every clone
//!   of the engine has been dropped.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, trace, warn};

use crate::broker::channel::{Handler, SubscriptionId};
use crate::broker::message::Message;
use crate::broker::registry::Registry;
use crate::broker::stream::SubscriptionStream;
use crate::config::PublishMode;
use crate::transport::{CommandConnection, Connector, Listener, ListenerConnection, TransportEvent};
use crate::utils::{EngineError, TransportError};

/// The publish/subscribe capability set exposed to producers and consumers.
#[async_trait]
pub trait PubSubEngine: Send + Sync {
    /// Persists `message` as the latest value of `topic`, then announces it.
    async fn publish(&self, topic: &str, message: Message) -> Result<(), EngineError>;

    /// Registers `handler` on `topic` and returns its handle. If the topic
    /// already holds a value, `handler` receives it before this returns.
    fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId;

    /// Removes a subscription. Unknown or already removed handles are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<Registry>,
    delivery: ReentrantMutex<()>,
    commands: Arc<dyn CommandConnection>,
    listener: Box<dyn ListenerConnection>,
    fetches: UnboundedSender<String>,
    publish_mode: PublishMode,
}

impl Engine {
    /// Opens both backend connections through `connector` and starts the
    /// dispatcher task.
    pub async fn connect<C>(connector: &C, publish_mode: PublishMode) -> Result<Self, TransportError>
    where
        C: Connector + ?Sized,
    {
        let commands = connector.connect_commands().await?;
        let listener = connector.connect_listener().await?;
        Ok(Self::start(commands, listener, publish_mode))
    }

    /// Builds an engine from already open connections.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        commands: Arc<dyn CommandConnection>,
        listener: Listener,
        publish_mode: PublishMode,
    ) -> Self {
        let Listener { connection, events } = listener;
        let (fetches, fetch_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(Registry::new()),
            delivery: ReentrantMutex::new(()),
            commands,
            listener: connection,
            fetches,
            publish_mode,
        });

        tokio::spawn(dispatch_loop(Arc::downgrade(&shared), events, fetch_rx));

        Self { shared }
    }

    /// Convenience wrapper around `subscribe` for closures.
    pub fn subscribe_fn<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe(topic, Arc::new(handler))
    }

    /// Iteration-style consumption of `topic`; dropping the stream unsubscribes.
    pub fn stream(&self, topic: &str) -> SubscriptionStream<Engine> {
        SubscriptionStream::new(self.clone(), topic)
    }

    /// Dispatcher entry point for a raw value of `topic`.
    ///
    /// Invoked for listener pushes and for fetched values. Missing payloads,
    /// topics nobody watches locally, malformed payloads and values that are
    /// not strictly newer than the channel's current one are dropped.
    pub fn handle_incoming(&self, topic: &str, raw: Option<&str>) {
        self.shared.handle_incoming(topic, raw);
    }

    /// Number of handlers registered on `topic` (0 when no channel exists).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared
            .state
            .lock()
            .lookup(topic)
            .map_or(0, |channel| channel.subscriber_count())
    }

    pub fn has_channel(&self, topic: &str) -> bool {
        self.shared.state.lock().lookup(topic).is_some()
    }

    /// Last accepted value of `topic`, if it has a channel and a value.
    pub fn latest(&self, topic: &str) -> Option<Message> {
        self.shared
            .state
            .lock()
            .lookup(topic)
            .and_then(|channel| channel.last_message.clone())
    }

    /// Number of live handles that watch `topic`.
    pub fn active_handles(&self, topic: &str) -> usize {
        self.shared.state.lock().active_handles(topic)
    }
}

#[async_trait]
impl PubSubEngine for Engine {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), EngineError> {
        let raw = message.encode().map_err(EngineError::Encode)?;

        // The stored value must land before the announce so a subscriber
        // created in between fetches it.
        self.shared.commands.set(topic, &raw).await?;

        match self.shared.publish_mode {
            PublishMode::Acknowledged => self.shared.commands.publish(topic, &raw).await?,
            PublishMode::FireAndForget => {
                let commands = self.shared.commands.clone();
                let topic = topic.to_string();
                tokio::spawn(async move {
                    if let Err(e) = commands.publish(&topic, &raw).await {
                        error!(topic = %topic, "Failed to announce value: {e}");
                    }
                });
            }
        }

        trace!(topic, timestamp = message.timestamp, "published");
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId {
        let _delivery = self.shared.delivery.lock();

        let subscribed = {
            let mut state = self.shared.state.lock();
            let subscribed = state.subscribe(topic, handler.clone());
            if subscribed.created {
                debug!(topic, "channel created");
                self.shared.listener.subscribe(topic);
                if self.shared.fetches.send(topic.to_string()).is_err() {
                    warn!(topic, "dispatcher stopped; latest value not fetched");
                }
            }
            subscribed
        };

        if let Some(message) = &subscribed.replay {
            if self.shared.state.lock().is_active(subscribed.id) {
                handler(message);
            }
        }

        subscribed.id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        // Waits out a fan-out pass running on another thread; once this
        // returns the handler is never invoked again.
        let _delivery = self.shared.delivery.lock();
        let mut state = self.shared.state.lock();
        if let Some(topic) = state.unsubscribe(id) {
            debug!(topic = %topic, "channel released");
            self.shared.listener.unsubscribe(&topic);
        }
    }
}

impl Shared {
    fn handle_incoming(&self, topic: &str, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };

        let _delivery = self.delivery.lock();

        if self.state.lock().lookup(topic).is_none() {
            trace!(topic, "no local subscribers; dropping value");
            return;
        }

        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                error!(topic, "Dropping value: {e}");
                return;
            }
        };

        let Some(handlers) = self.state.lock().accept(topic, &message) else {
            trace!(topic, timestamp = message.timestamp, "stale value dropped");
            return;
        };

        for (id, handler) in handlers {
            if self.state.lock().is_active(id) {
                handler(&message);
            }
        }
    }
}

async fn dispatch_loop(
    shared: Weak<Shared>,
    mut events: UnboundedReceiver<TransportEvent>,
    mut fetches: UnboundedReceiver<String>,
) {
    let mut listening = true;

    loop {
        tokio::select! {
            fetch = fetches.recv() => {
                let Some(topic) = fetch else { break };
                let Some(engine) = shared.upgrade() else { break };
                let commands = engine.commands.clone();
                let shared = shared.clone();
                drop(engine);

                tokio::spawn(async move {
                    match commands.get(&topic).await {
                        Ok(raw) => {
                            if let Some(engine) = shared.upgrade() {
                                engine.handle_incoming(&topic, raw.as_deref());
                            }
                        }
                        Err(e) => error!(topic = %topic, "Failed to fetch latest value: {e}"),
                    }
                });
            }
            event = events.recv(), if listening => match event {
                Some(TransportEvent::Message { topic, payload }) => {
                    let Some(engine) = shared.upgrade() else { break };
                    engine.handle_incoming(&topic, Some(&payload));
                }
                Some(TransportEvent::Error(e)) => error!("Backend listener error: {e}"),
                None => {
                    warn!("Backend listener closed");
                    listening = false;
                }
            },
        }
    }

    debug!("Dispatcher stopped");
}
