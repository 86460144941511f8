//! The `server` module is the backend the engine talks to over WebSockets:
//! a latest-value store plus topic announcements, in the spirit of a small
//! Redis. It knows nothing about timestamps or freshness; those live in the
//! engine.

pub mod hub;
pub mod topic;
pub mod websocket;

use parking_lot::Mutex;

use crate::persistence::Store;

pub use hub::Hub;
pub use websocket::{handle_request, serve, start_websocket_server};

/// Everything a server connection needs: the hub and the value store.
#[derive(Debug)]
pub struct ServerState {
    pub hub: Mutex<Hub>,
    pub store: Store,
}

impl ServerState {
    pub fn new(store: Store) -> Self {
        Self {
            hub: Mutex::new(Hub::new()),
            store,
        }
    }
}
