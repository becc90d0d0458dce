//! Shared types for the table-service backend
//!
//! Types used by the server and by any client that talks to it:
//! error codes and response envelopes, domain models (tables, rounds,
//! tickets) and the message-bus signal format.

pub mod error;
pub mod message;
pub mod models;
pub mod request;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

// Message bus re-exports (for convenient access)
pub use message::{BusMessage, SignalKind, TableSignal, Topic};
