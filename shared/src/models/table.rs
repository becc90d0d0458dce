//! Table Model

use serde::{Deserialize, Serialize};

/// Physical table (mesa)
///
/// `number` is assigned once and never reused while the table is live.
/// Occupancy is deliberately not stored here; see [`TableStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub number: u32,
    pub display_name: String,
    pub is_fixed: bool,
    /// Opaque layout metadata owned by the floor-plan client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<serde_json::Value>,
    pub created_at: i64,
}

/// Derived occupancy state of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    /// No open round
    Free,
    /// Open rounds, service not yet confirmed
    Serving,
    /// Open rounds and service confirmed
    Occupied,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Free => "free",
            TableStatus::Serving => "serving",
            TableStatus::Occupied => "occupied",
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, TableStatus::Free)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the floor overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatusEntry {
    pub table_number: u32,
    pub status: TableStatus,
}
