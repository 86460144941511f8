//! The `broker` module is the subscription multiplexer: channel registry,
//! subscription table, freshness-checked dispatch and the engine facade.

pub mod channel;
pub mod engine;
pub mod message;
pub mod registry;
pub mod stream;

pub use channel::{Channel, Handler, SubscriptionId};
pub use engine::{Engine, PubSubEngine};
pub use message::Message;
pub use registry::{Registry, Subscribed, Subscription};
pub use stream::SubscriptionStream;
