//! Catalog Item Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sellable catalog entry, owned by the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub available: bool,
}
