//! The `client` module defines a peer connected to the backend server.
//!
//! It provides the `Client` struct, which pairs a connection's unique
//! identifier with the channel used to push frames to it.

pub mod pubsub_client;
pub use pubsub_client::{Client, ClientId};

#[cfg(test)]
mod tests;
