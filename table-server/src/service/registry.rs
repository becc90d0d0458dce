//! Table registry: fixed and custom tables

use super::error::{ServiceError, ServiceResult};
use super::{TableService, commit};
use crate::message::{SignalKind, Topic};
use shared::models::Table;
use shared::util::{new_id, now_millis};

/// Longest accepted display name
const MAX_TABLE_NAME_LEN: usize = 64;

fn fixed_table_name(number: u32) -> String {
    format!("Mesa {}", number)
}

impl TableService {
    /// Create fixed tables `1..=count` that do not exist yet
    ///
    /// Returns how many were created. Safe to call on every startup.
    pub fn seed_fixed_tables(&self, count: u32) -> ServiceResult<usize> {
        let txn = self.storage.begin_write()?;
        let mut created = 0;
        for number in 1..=count {
            if self.storage.get_table_txn(&txn, number)?.is_some() {
                continue;
            }
            let name = fixed_table_name(number);
            if let Some(holder) = self.storage.table_number_by_name_txn(&txn, &name)? {
                tracing::warn!(table_number = number, holder, name = %name, "Fixed table name already taken, skipping");
                continue;
            }
            let table = Table {
                id: new_id(),
                number,
                display_name: name,
                is_fixed: true,
                placement: None,
                created_at: now_millis(),
            };
            self.storage.put_table(&txn, &table)?;
            created += 1;
        }
        commit(txn)?;

        if created > 0 {
            tracing::info!(created, count, "Fixed tables seeded");
        }
        Ok(created)
    }

    /// Create a custom table
    ///
    /// The number is `max(fixed count, highest number ever issued) + 1`, so a
    /// deleted custom table's number is never reused.
    pub async fn create_custom_table(
        &self,
        name: &str,
        placement: Option<serde_json::Value>,
    ) -> ServiceResult<Table> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("table name must not be empty"));
        }
        if name.chars().count() > MAX_TABLE_NAME_LEN {
            return Err(ServiceError::Validation(format!(
                "table name exceeds {} characters",
                MAX_TABLE_NAME_LEN
            )));
        }

        let txn = self.storage.begin_write()?;
        if self.storage.table_number_by_name_txn(&txn, name)?.is_some() {
            return Err(ServiceError::TableNameExists(name.to_string()));
        }
        let number = self.storage.next_table_number(&txn, self.fixed_table_count)?;
        let table = Table {
            id: new_id(),
            number,
            display_name: name.to_string(),
            is_fixed: false,
            placement,
            created_at: now_millis(),
        };
        self.storage.put_table(&txn, &table)?;
        commit(txn)?;

        tracing::info!(table_number = number, name = %table.display_name, "Custom table created");
        self.notify(Topic::TablesUpdate, number, SignalKind::TableCreated);
        Ok(table)
    }

    /// All tables, ordered by number
    pub fn list_tables(&self) -> ServiceResult<Vec<Table>> {
        Ok(self.storage.list_tables()?)
    }

    pub fn get_table(&self, number: u32) -> ServiceResult<Table> {
        self.storage
            .get_table(number)?
            .ok_or(ServiceError::TableNotFound(number))
    }

    /// Delete a custom table that has no open rounds
    ///
    /// Paid rounds and tickets of the table are kept.
    pub async fn delete_custom_table(&self, number: u32) -> ServiceResult<()> {
        let _guard = self.locks.lock(number).await;

        let txn = self.storage.begin_write()?;
        let table = self
            .storage
            .get_table_txn(&txn, number)?
            .ok_or(ServiceError::TableNotFound(number))?;
        if table.is_fixed {
            return Err(ServiceError::TableIsFixed(number));
        }
        if !self.storage.open_rounds_txn(&txn, number)?.is_empty() {
            return Err(ServiceError::TableOccupied(number));
        }
        self.storage.remove_table(&txn, &table)?;
        commit(txn)?;

        tracing::info!(table_number = number, "Custom table deleted");
        self.notify(Topic::TablesUpdate, number, SignalKind::TableDeleted);
        Ok(())
    }
}
