//! In-process message bus
//!
//! ```text
//! TableService ──▶ Notifier::publish() ──▶ broadcast::Sender<BusMessage>
//!                                                   │
//!                                      ┌────────────┼────────────┐
//!                                      ▼            ▼            ▼
//!                                  subscriber   subscriber   subscriber
//! ```
//!
//! Slow subscribers lag and lose old signals; that is acceptable because a
//! signal only asks them to re-fetch.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BusMessage, Notifier, TableSignal, Topic, TransportError};

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Message bus - broadcasts table signals to every subscriber
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    /// Create a bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every signal published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast a message to all subscribers
    pub fn send(&self, msg: BusMessage) -> Result<(), TransportError> {
        let topic = msg.topic;
        self.tx
            .send(msg)
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers(topic))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MessageBus {
    async fn publish(&self, topic: Topic, signal: TableSignal) -> Result<(), TransportError> {
        let msg = BusMessage::signal(topic, &signal)?;
        self.send(msg)
    }
}
