//! Per-table mutual exclusion
//!
//! Mutations against one table number run one at a time; different tables
//! never wait on each other. Guards are async so they can be held across
//! catalog lookups. A slot lives only while someone holds or awaits it, so
//! the registry never outgrows the number of in-flight calls.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock registry keyed by table number
#[derive(Debug, Clone, Default)]
pub struct TableLocks {
    locks: Arc<DashMap<u32, Arc<Mutex<()>>>>,
}

/// Guard(s) for one or two tables, released on drop
#[derive(Debug)]
pub struct TableGuard {
    guards: Vec<(u32, OwnedMutexGuard<()>)>,
    locks: Arc<DashMap<u32, Arc<Mutex<()>>>>,
}

impl Drop for TableGuard {
    fn drop(&mut self) {
        for (table_number, guard) in self.guards.drain(..).rev() {
            drop(guard);
            // Only the map still refers to the slot: nobody holds or waits on it
            self.locks
                .remove_if(&table_number, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, table_number: u32) -> Arc<Mutex<()>> {
        self.locks
            .entry(table_number)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Whether no table is locked or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock a single table
    pub async fn lock(&self, table_number: u32) -> TableGuard {
        let guard = self.slot(table_number).lock_owned().await;
        TableGuard {
            guards: vec![(table_number, guard)],
            locks: self.locks.clone(),
        }
    }

    /// Lock two tables in ascending order so opposite moves cannot deadlock
    pub async fn lock_pair(&self, a: u32, b: u32) -> TableGuard {
        if a == b {
            return self.lock(a).await;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let first = self.slot(low).lock_owned().await;
        let second = self.slot(high).lock_owned().await;
        TableGuard {
            guards: vec![(low, first), (high, second)],
            locks: self.locks.clone(),
        }
    }
}
