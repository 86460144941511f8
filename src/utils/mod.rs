//! The `utils` module provides shared definitions used across `lastsub`:
//! the error taxonomy and the tracing setup.

pub mod error;
pub mod logging;

pub use error::{DecodeError, EngineError, ServerError, StoreError, TransportError};
