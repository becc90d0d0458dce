//! Request types for the table-server request layer

use crate::models::{LineItemInput, PaymentMethod, SelectedItem};
use serde::{Deserialize, Serialize};

/// Open a new round on a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRoundRequest {
    pub table_number: u32,
    pub line_items: Vec<LineItemInput>,
}

/// Append to, or replace the lines of, an open round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLineItemsRequest {
    pub round_id: String,
    pub line_items: Vec<LineItemInput>,
}

/// Pay whole rounds of a table and issue one ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub table_number: u32,
    pub round_ids: Vec<String>,
    pub payment_method: PaymentMethod,
}

/// Pay an arbitrary subset of a table's ordered items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectivePaymentRequest {
    pub table_number: u32,
    pub items: Vec<SelectedItem>,
    pub payment_method: PaymentMethod,
}

/// Move every open round of one table to a free table
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveTableRequest {
    pub from_table_number: u32,
    pub to_table_number: u32,
}

/// Create a custom (non-fixed) table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub name: String,
    #[serde(default)]
    pub placement: Option<serde_json::Value>,
}

/// Month selector for accounting queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}
