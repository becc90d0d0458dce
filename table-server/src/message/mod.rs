//! Realtime notification
//!
//! - [`Notifier`]: capability injected into the services; publishes a
//!   [`TableSignal`] after a mutation commits
//! - [`MessageBus`]: in-process broadcast implementation of [`Notifier`]
//!
//! Publishing is fire-and-forget from the services' point of view: a
//! [`TransportError`] is logged at the publish site and never reaches the
//! caller of the mutation.

mod bus;

pub use bus::MessageBus;
pub use shared::message::{BusMessage, SignalKind, TableSignal, Topic};

use async_trait::async_trait;
use thiserror::Error;

/// Realtime transport errors (never fatal to the triggering mutation)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No subscribers for {0}")]
    NoSubscribers(Topic),

    #[error("Failed to encode signal: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport closed: {0}")]
    Closed(String),
}

/// Fan-out of "wake up and re-pull" signals
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: Topic, signal: TableSignal) -> Result<(), TransportError>;
}
