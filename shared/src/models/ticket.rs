//! Ticket Model
//!
//! Tickets are append-only receipts. `ticket_number` is `YYMMDD` followed by
//! a zero-padded three digit daily sequence, e.g. `250314007`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment method
///
/// Accepts the legacy Spanish spellings on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "efectivo")]
    Cash,
    #[serde(alias = "tarjeta")]
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a paid line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketLine {
    pub line_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_item_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Checkout receipt (ticket)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub ticket_number: String,
    pub table_number: u32,
    pub items: Vec<TicketLine>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub source_round_ids: Vec<String>,
    pub created_at: i64,
}

impl Ticket {
    /// Daily sequence part of the ticket number
    pub fn sequence(&self) -> Option<u32> {
        self.ticket_number.get(6..)?.parse().ok()
    }

    /// `YYMMDD` part of the ticket number
    pub fn day_prefix(&self) -> Option<&str> {
        self.ticket_number.get(..6)
    }
}
