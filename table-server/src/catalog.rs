//! Catalog lookup
//!
//! The catalog (products, drinks, flavours) is managed elsewhere; the table
//! service only needs to resolve an item id to its current name and price
//! so they can be snapshotted into a round.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::models::CatalogItem;
use std::collections::HashMap;

/// Read-only catalog lookup
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve an item; `None` when the id is unknown
    async fn lookup_item(&self, id: &str) -> Option<CatalogItem>;
}

/// In-memory catalog cache
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<String, CatalogItem>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    /// Insert or replace an item
    pub fn upsert(&self, item: CatalogItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    pub fn remove(&self, id: &str) -> Option<CatalogItem> {
        self.items.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn lookup_item(&self, id: &str) -> Option<CatalogItem> {
        self.items.read().get(id).cloned()
    }
}
