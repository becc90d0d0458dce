//! Table transfer: move a party's open rounds to a free table

use super::error::{ServiceError, ServiceResult};
use super::{TableService, commit};
use crate::message::{SignalKind, Topic};

impl TableService {
    /// Move every open round of `from` to `to`
    ///
    /// The destination must be free. The service flag follows the rounds and
    /// the source ends up free. Paid rounds stay where they were paid.
    pub async fn move_table(&self, from: u32, to: u32) -> ServiceResult<()> {
        if from == to {
            return Err(ServiceError::validation("cannot move a table onto itself"));
        }
        let _guard = self.locks.lock_pair(from, to).await;

        let txn = self.storage.begin_write()?;
        if self.storage.get_table_txn(&txn, from)?.is_none() {
            return Err(ServiceError::TableNotFound(from));
        }
        if self.storage.get_table_txn(&txn, to)?.is_none() {
            return Err(ServiceError::TableNotFound(to));
        }

        let rounds = self.storage.open_rounds_txn(&txn, from)?;
        if rounds.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "table {} has no open rounds to move",
                from
            )));
        }
        if !self.storage.open_rounds_txn(&txn, to)?.is_empty() {
            return Err(ServiceError::TableOccupied(to));
        }

        let confirmed = self.storage.is_service_confirmed_txn(&txn, from)?;
        for mut round in rounds.iter().cloned() {
            self.storage.unindex_open_round(&txn, from, &round.id)?;
            round.table_number = to;
            self.storage.put_round(&txn, &round)?;
        }
        self.storage.set_service_confirmed(&txn, from, false)?;
        self.storage.set_service_confirmed(&txn, to, confirmed)?;
        commit(txn)?;

        let moved = rounds.len();
        tracing::info!(from, to, rounds = moved, service_confirmed = confirmed, "Table moved");
        self.notify(Topic::RoundsUpdate, from, SignalKind::TableMoved);
        self.notify(Topic::RoundsUpdate, to, SignalKind::TableMoved);
        Ok(())
    }
}
