//! Occupancy deriver
//!
//! Table status is computed on every read from the open-round count and the
//! per-table service flag. It is never stored.

use super::TableService;
use super::error::ServiceResult;
use shared::models::{TableStatus, TableStatusEntry};

/// free: no open round; occupied: open rounds and service confirmed;
/// serving: open rounds, service not confirmed yet
pub fn derive_status(open_rounds: usize, service_confirmed: bool) -> TableStatus {
    match (open_rounds, service_confirmed) {
        (0, _) => TableStatus::Free,
        (_, true) => TableStatus::Occupied,
        (_, false) => TableStatus::Serving,
    }
}

impl TableService {
    pub fn table_status(&self, table_number: u32) -> ServiceResult<TableStatus> {
        self.get_table(table_number)?;
        let (open_rounds, confirmed) = self.storage.occupancy(table_number)?;
        Ok(derive_status(open_rounds, confirmed))
    }

    /// Status of every live table, ordered by number (free tables included)
    pub fn table_statuses(&self) -> ServiceResult<Vec<TableStatusEntry>> {
        Ok(self
            .storage
            .floor_snapshot()?
            .into_iter()
            .map(|(table, open_rounds, confirmed)| TableStatusEntry {
                table_number: table.number,
                status: derive_status(open_rounds, confirmed),
            })
            .collect())
    }
}
