//! TableService - table registry, rounds, occupancy, checkout and transfer
//!
//! # Mutation Flow
//!
//! ```text
//! mutation(table_number, ...)
//!     ├─ 1. Validate input (no locks held)
//!     ├─ 2. Acquire the per-table guard (both guards for a move)
//!     ├─ 3. Resolve catalog items (async, guard held)
//!     ├─ 4. Begin write transaction
//!     ├─ 5. Re-check state, apply every record change
//!     ├─ 6. Commit transaction (all-or-nothing)
//!     ├─ 7. Spawn the realtime signal (fire-and-forget)
//!     └─ 8. Return result
//! ```
//!
//! Nothing is awaited while a write transaction is open. A failed step drops
//! the transaction uncommitted and no signal is sent.

mod accounting;
mod checkout;
mod error;
mod locks;
pub mod money;
mod occupancy;
mod registry;
mod rounds;
mod storage;
mod transfer;

#[cfg(test)]
mod tests;

pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use locks::{TableGuard, TableLocks};
pub use occupancy::derive_status;
pub use storage::{
    MAX_DAILY_SEQUENCE, MAX_SEQUENCE_PROBES, StorageError, StorageResult, StorageStats,
    TableStorage,
};

use crate::catalog::Catalog;
use crate::message::{Notifier, SignalKind, TableSignal, Topic, TransportError};
use chrono_tz::Tz;
use redb::WriteTransaction;
use std::sync::Arc;

/// Default number of fixed tables ("Mesa 1" to "Mesa 10")
pub const DEFAULT_FIXED_TABLE_COUNT: u32 = 10;

/// Table service
///
/// Cheap to clone; every clone shares storage, locks and collaborators.
#[derive(Clone)]
pub struct TableService {
    storage: TableStorage,
    locks: TableLocks,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
    fixed_table_count: u32,
}

impl std::fmt::Debug for TableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableService")
            .field("tz", &self.tz)
            .field("fixed_table_count", &self.fixed_table_count)
            .finish_non_exhaustive()
    }
}

impl TableService {
    pub fn new(storage: TableStorage, catalog: Arc<dyn Catalog>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            locks: TableLocks::new(),
            catalog,
            notifier,
            tz: chrono_tz::Europe::Madrid,
            fixed_table_count: DEFAULT_FIXED_TABLE_COUNT,
        }
    }

    /// Business timezone used for ticket days and daily stats
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Number of fixed tables; custom tables are numbered above it
    pub fn with_fixed_table_count(mut self, count: u32) -> Self {
        self.fixed_table_count = count;
        self
    }

    pub fn storage(&self) -> &TableStorage {
        &self.storage
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Publish a signal in the background
    ///
    /// Only called after a commit. Failures are logged and swallowed.
    fn notify(&self, topic: Topic, table_number: u32, kind: SignalKind) {
        let notifier = self.notifier.clone();
        let signal = TableSignal::new(table_number, kind);
        tokio::spawn(async move {
            match notifier.publish(topic, signal).await {
                Ok(()) => {}
                Err(TransportError::NoSubscribers(_)) => {
                    tracing::debug!(%topic, table_number, kind = ?kind, "No realtime subscribers");
                }
                Err(e) => {
                    tracing::warn!(%topic, table_number, kind = ?kind, error = %e, "Realtime publish failed");
                }
            }
        });
    }
}

fn commit(txn: WriteTransaction) -> ServiceResult<()> {
    txn.commit().map_err(StorageError::from)?;
    Ok(())
}
