//! The `persistence` module stores the latest value of every key written to
//! the backend server.
//!
//! A subscriber joining a topic fetches this value to catch up, so only the
//! most recent value is kept; there is no history.
//!
//! It uses `sled` as an embedded key-value store.

pub mod sled_store;

pub use sled_store::Store;

#[cfg(test)]
mod tests;
