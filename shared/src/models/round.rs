//! Round Model
//!
//! A round is one batch of line items ordered against a table. It stays
//! mutable until paid; after that it is frozen.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Line item as submitted by a caller
///
/// `catalog_item_id` is resolved against the catalog at order time.
/// Unresolved or custom items fall back to the caller-supplied `name`/`price`.
/// `line_id` is only meaningful for replace, where it keeps an existing line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemInput {
    #[serde(default)]
    pub line_id: Option<String>,
    #[serde(default)]
    pub catalog_item_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    pub quantity: u32,
    #[serde(default)]
    pub variant: Option<String>,
}

impl LineItemInput {
    /// Input referencing a catalog item
    pub fn catalog(catalog_item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            catalog_item_id: Some(catalog_item_id.into()),
            quantity,
            ..Default::default()
        }
    }

    /// Input for an off-menu item with an explicit name and price
    pub fn custom(name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            name: Some(name.into()),
            price: Some(price),
            quantity,
            ..Default::default()
        }
    }
}

/// Line item with the catalog name and price snapshotted at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable per-line identifier
    pub line_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_item_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl LineItem {
    /// unit_price × quantity, rounded to cents
    pub fn line_total(&self) -> Decimal {
        (self.unit_price * Decimal::from(self.quantity))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Round (ronda)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub table_number: u32,
    pub line_items: Vec<LineItem>,
    pub is_paid: bool,
    /// Per-table service flag as seen by this round
    ///
    /// Open rounds mirror the owning table's flag; a paid round keeps the
    /// value it had at payment time.
    pub is_service_confirmed: bool,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    /// Excluded from the daily accounting view after a daily reset
    #[serde(default)]
    pub archived: bool,
}

impl Round {
    pub fn total(&self) -> Decimal {
        self.line_items.iter().map(LineItem::line_total).sum()
    }

    pub fn is_open(&self) -> bool {
        !self.is_paid
    }

    pub fn find_line(&self, line_id: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|l| l.line_id == line_id)
    }
}

/// Open rounds of a table plus what they add up to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRounds {
    pub table_number: u32,
    pub rounds: Vec<Round>,
    pub total: Decimal,
}

/// One entry of a selective payment: `quantity` units of a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub round_id: String,
    pub line_id: String,
    pub quantity: u32,
}
