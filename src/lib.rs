//! # lastsub
//!
//! `lastsub` multiplexes many local subscribers per topic over a shared
//! key-value/pub-sub backend and gives every topic "last known value"
//! semantics: a subscriber joining a topic immediately receives the most
//! recent message, not just future ones.
//!
//! ## Core Modules
//!
//! - `broker`: the subscription multiplexer (channel registry, subscription
//!   table, freshness-checked dispatch) and the `Engine` facade.
//! - `transport`: the backend contract plus in-memory and WebSocket backends.
//! - `server`: a WebSocket backend server storing the latest value per key.
//! - `client`: a peer connected to the backend server.
//! - `persistence`: the sled-backed latest-value store used by the server.
//! - `config`: loading and merging configuration.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod server;
pub mod transport;
pub mod utils;

pub use broker::{Engine, Handler, Message, PubSubEngine, SubscriptionId, SubscriptionStream};
pub use utils::{EngineError, TransportError};
