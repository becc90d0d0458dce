//! Message bus types
//!
//! Shared between table-server and its clients for in-process (memory)
//! and network fan-out of change signals.
//!
//! A signal is a "wake up and re-pull" hint: it carries the affected table
//! number and what happened, never the new state. Receivers must tolerate
//! missed, duplicated and reordered signals.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Realtime topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Rounds, checkouts and transfers
    #[serde(rename = "rounds:update")]
    RoundsUpdate,
    /// Table registry changes
    #[serde(rename = "tables:update")]
    TablesUpdate,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::RoundsUpdate => "rounds:update",
            Topic::TablesUpdate => "tables:update",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RoundOpened,
    ItemsAppended,
    ItemsReplaced,
    ServiceConfirmed,
    RoundPaid,
    TablePaid,
    TableCleaned,
    TicketIssued,
    TableMoved,
    TableCreated,
    TableDeleted,
}

/// Signal payload: `{"tableNumber": 5, "eventKind": "round_opened"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSignal {
    pub table_number: u32,
    pub event_kind: SignalKind,
}

impl TableSignal {
    pub fn new(table_number: u32, event_kind: SignalKind) -> Self {
        Self {
            table_number,
            event_kind,
        }
    }
}

/// Bus envelope as carried by the broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    /// Used for message tracing
    pub request_id: Uuid,
    pub topic: Topic,
    /// JSON-encoded [`TableSignal`]
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Wrap a signal for the given topic
    pub fn signal(topic: Topic, signal: &TableSignal) -> Result<Self, serde_json::Error> {
        Ok(Self {
            request_id: Uuid::new_v4(),
            topic,
            payload: serde_json::to_vec(signal)?,
        })
    }

    /// Decode the payload back into a signal
    pub fn parse_signal(&self) -> Result<TableSignal, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
