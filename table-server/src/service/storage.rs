//! redb-based storage layer for tables, rounds and tickets
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `tables` | `number` | `Table` | Table registry |
//! | `table_names` | `lowercased name` | `number` | Name uniqueness |
//! | `rounds` | `round_id` | `Round` | Every round, open or paid |
//! | `open_rounds` | `(number, round_id)` | `()` | Open-round index per table |
//! | `service_confirmed` | `number` | `()` | Per-table service flag |
//! | `tickets` | `ticket_id` | `Ticket` | Append-only receipts |
//! | `ticket_numbers` | `ticket_number` | `ticket_id` | Human number uniqueness |
//! | `daily_sequence` | `YYMMDD` | `u64` | Per-day ticket counter |
//! | `counters` | `name` | `u64` | Table number high-water mark |
//!
//! # Atomicity
//!
//! Every mutation that touches more than one record runs inside a single
//! `WriteTransaction`. Dropping the transaction without `commit()` aborts it,
//! so a failed checkout never leaves a half-paid table or a burnt ticket number.

use chrono::{Datelike, NaiveDate};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use shared::models::{Round, Table, Ticket};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table registry: key = table number, value = JSON-serialized Table
const TABLES_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("tables");

/// Name index: key = lowercased display name, value = table number
const TABLE_NAMES_TABLE: TableDefinition<&str, u32> = TableDefinition::new("table_names");

/// Rounds: key = round_id, value = JSON-serialized Round
const ROUNDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rounds");

/// Open rounds index: key = (table_number, round_id), value = empty
const OPEN_ROUNDS_TABLE: TableDefinition<(u32, &str), ()> = TableDefinition::new("open_rounds");

/// Per-table service confirmation: key = table_number, value = empty (existence check)
const SERVICE_CONFIRMED_TABLE: TableDefinition<u32, ()> =
    TableDefinition::new("service_confirmed");

/// Tickets: key = ticket_id, value = JSON-serialized Ticket
const TICKETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");

/// Ticket number index: key = human ticket number, value = ticket_id
const TICKET_NUMBERS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("ticket_numbers");

/// Daily ticket counter: key = YYMMDD, value = last issued sequence
const DAILY_SEQUENCE_TABLE: TableDefinition<u32, u64> = TableDefinition::new("daily_sequence");

/// Named counters
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const TABLE_NUMBER_KEY: &str = "table_number";

/// Highest sequence a day can issue (three digits)
pub const MAX_DAILY_SEQUENCE: u64 = 999;

/// How many already-taken ticket numbers the allocator skips before giving up
pub const MAX_SEQUENCE_PROBES: u32 = 16;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ticket sequence exhausted for day {0}")]
    SequenceExhausted(String),

    #[error("Ticket number allocation for day {0} kept colliding")]
    SequenceContention(String),

    #[error("Table numbers exhausted")]
    TableNumbersExhausted,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Table-service storage backed by redb
#[derive(Clone)]
pub struct TableStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for TableStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStorage").finish_non_exhaustive()
    }
}

impl TableStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable as soon as `commit()` returns and the file is
    /// always in a consistent state, so a power cut mid-checkout loses the
    /// checkout, never half of it.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TABLES_TABLE)?;
            let _ = write_txn.open_table(TABLE_NAMES_TABLE)?;
            let _ = write_txn.open_table(ROUNDS_TABLE)?;
            let _ = write_txn.open_table(OPEN_ROUNDS_TABLE)?;
            let _ = write_txn.open_table(SERVICE_CONFIRMED_TABLE)?;
            let _ = write_txn.open_table(TICKETS_TABLE)?;
            let _ = write_txn.open_table(TICKET_NUMBERS_TABLE)?;
            let _ = write_txn.open_table(DAILY_SEQUENCE_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Tables ==========

    /// Store a table and its name index entry
    pub fn put_table(&self, txn: &WriteTransaction, table: &Table) -> StorageResult<()> {
        let value = serde_json::to_vec(table)?;
        txn.open_table(TABLES_TABLE)?
            .insert(table.number, value.as_slice())?;
        txn.open_table(TABLE_NAMES_TABLE)?
            .insert(name_key(&table.display_name).as_str(), table.number)?;
        Ok(())
    }

    /// Remove a table and its name index entry
    pub fn remove_table(&self, txn: &WriteTransaction, table: &Table) -> StorageResult<()> {
        txn.open_table(TABLES_TABLE)?.remove(table.number)?;
        txn.open_table(TABLE_NAMES_TABLE)?
            .remove(name_key(&table.display_name).as_str())?;
        txn.open_table(SERVICE_CONFIRMED_TABLE)?.remove(table.number)?;
        Ok(())
    }

    pub fn get_table(&self, number: u32) -> StorageResult<Option<Table>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLES_TABLE)?;
        read_json(&table, number)
    }

    pub fn get_table_txn(&self, txn: &WriteTransaction, number: u32) -> StorageResult<Option<Table>> {
        let table = txn.open_table(TABLES_TABLE)?;
        read_json(&table, number)
    }

    /// All tables, ordered by number
    pub fn list_tables(&self) -> StorageResult<Vec<Table>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLES_TABLE)?;

        let mut tables = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            tables.push(serde_json::from_slice(value.value())?);
        }
        Ok(tables)
    }

    /// Number of the table holding this name, if any (case-insensitive)
    pub fn table_number_by_name_txn(
        &self,
        txn: &WriteTransaction,
        name: &str,
    ) -> StorageResult<Option<u32>> {
        let table = txn.open_table(TABLE_NAMES_TABLE)?;
        Ok(table.get(name_key(name).as_str())?.map(|g| g.value()))
    }

    /// Allocate the next custom table number
    ///
    /// `max(floor, highest number ever issued) + 1`; the high-water mark is
    /// persisted so a deleted table's number is never handed out again.
    pub fn next_table_number(&self, txn: &WriteTransaction, floor: u32) -> StorageResult<u32> {
        let highest_live = {
            let table = txn.open_table(TABLES_TABLE)?;
            table.last()?.map(|(k, _)| k.value()).unwrap_or(0)
        };
        let mut counters = txn.open_table(COUNTERS_TABLE)?;
        let issued = counters
            .get(TABLE_NUMBER_KEY)?
            .map(|g| g.value())
            .unwrap_or(0);
        let next = issued.max(u64::from(floor)).max(u64::from(highest_live)) + 1;
        let number = u32::try_from(next).map_err(|_| StorageError::TableNumbersExhausted)?;
        counters.insert(TABLE_NUMBER_KEY, next)?;
        Ok(number)
    }

    // ========== Rounds ==========

    /// Store a round and keep the open-round index in step with `is_paid`
    pub fn put_round(&self, txn: &WriteTransaction, round: &Round) -> StorageResult<()> {
        let value = serde_json::to_vec(round)?;
        txn.open_table(ROUNDS_TABLE)?
            .insert(round.id.as_str(), value.as_slice())?;

        let mut index = txn.open_table(OPEN_ROUNDS_TABLE)?;
        let key = (round.table_number, round.id.as_str());
        if round.is_paid {
            index.remove(key)?;
        } else {
            index.insert(key, ())?;
        }
        Ok(())
    }

    /// Drop a round's open-index entry under `table_number` (before re-pointing it)
    pub fn unindex_open_round(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
        round_id: &str,
    ) -> StorageResult<()> {
        txn.open_table(OPEN_ROUNDS_TABLE)?
            .remove((table_number, round_id))?;
        Ok(())
    }

    /// Delete a round outright
    pub fn remove_round(&self, txn: &WriteTransaction, round: &Round) -> StorageResult<()> {
        txn.open_table(ROUNDS_TABLE)?.remove(round.id.as_str())?;
        txn.open_table(OPEN_ROUNDS_TABLE)?
            .remove((round.table_number, round.id.as_str()))?;
        Ok(())
    }

    pub fn get_round(&self, round_id: &str) -> StorageResult<Option<Round>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROUNDS_TABLE)?;
        read_json(&table, round_id)
    }

    pub fn get_round_txn(&self, txn: &WriteTransaction, round_id: &str) -> StorageResult<Option<Round>> {
        let table = txn.open_table(ROUNDS_TABLE)?;
        read_json(&table, round_id)
    }

    /// Open rounds of a table, oldest first
    pub fn open_rounds(&self, table_number: u32) -> StorageResult<Vec<Round>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OPEN_ROUNDS_TABLE)?;
        let rounds = read_txn.open_table(ROUNDS_TABLE)?;
        collect_open_rounds(&index, &rounds, table_number)
    }

    /// Open rounds of a table, oldest first (within transaction)
    pub fn open_rounds_txn(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
    ) -> StorageResult<Vec<Round>> {
        let index = txn.open_table(OPEN_ROUNDS_TABLE)?;
        let rounds = txn.open_table(ROUNDS_TABLE)?;
        collect_open_rounds(&index, &rounds, table_number)
    }

    /// Open-round count and service flag of one table, from a single snapshot
    pub fn occupancy(&self, table_number: u32) -> StorageResult<(usize, bool)> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OPEN_ROUNDS_TABLE)?;
        let confirmed = read_txn.open_table(SERVICE_CONFIRMED_TABLE)?;

        let mut count = 0;
        for entry in index.range((table_number, "")..)? {
            let (key, _) = entry?;
            if key.value().0 != table_number {
                break;
            }
            count += 1;
        }
        Ok((count, confirmed.get(table_number)?.is_some()))
    }

    /// Every table with its open-round count and service flag, from a single snapshot
    pub fn floor_snapshot(&self) -> StorageResult<Vec<(Table, usize, bool)>> {
        let read_txn = self.db.begin_read()?;
        let tables = read_txn.open_table(TABLES_TABLE)?;
        let index = read_txn.open_table(OPEN_ROUNDS_TABLE)?;
        let confirmed = read_txn.open_table(SERVICE_CONFIRMED_TABLE)?;

        let mut counts: HashMap<u32, usize> = HashMap::new();
        for result in index.iter()? {
            let (key, _) = result?;
            *counts.entry(key.value().0).or_default() += 1;
        }

        let mut floor = Vec::new();
        for result in tables.iter()? {
            let (key, value) = result?;
            let number = key.value();
            let table: Table = serde_json::from_slice(value.value())?;
            let is_confirmed = confirmed.get(number)?.is_some();
            floor.push((table, counts.get(&number).copied().unwrap_or(0), is_confirmed));
        }
        Ok(floor)
    }

    /// Every stored round matching `filter`
    pub fn scan_rounds(&self, filter: impl Fn(&Round) -> bool) -> StorageResult<Vec<Round>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROUNDS_TABLE)?;

        let mut rounds = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let round: Round = serde_json::from_slice(value.value())?;
            if filter(&round) {
                rounds.push(round);
            }
        }
        Ok(rounds)
    }

    /// Every stored round matching `filter` (within transaction)
    pub fn scan_rounds_txn(
        &self,
        txn: &WriteTransaction,
        filter: impl Fn(&Round) -> bool,
    ) -> StorageResult<Vec<Round>> {
        let table = txn.open_table(ROUNDS_TABLE)?;

        let mut rounds = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let round: Round = serde_json::from_slice(value.value())?;
            if filter(&round) {
                rounds.push(round);
            }
        }
        Ok(rounds)
    }

    // ========== Service confirmation ==========

    pub fn is_service_confirmed_txn(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
    ) -> StorageResult<bool> {
        let table = txn.open_table(SERVICE_CONFIRMED_TABLE)?;
        Ok(table.get(table_number)?.is_some())
    }

    pub fn set_service_confirmed(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
        confirmed: bool,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SERVICE_CONFIRMED_TABLE)?;
        if confirmed {
            table.insert(table_number, ())?;
        } else {
            table.remove(table_number)?;
        }
        Ok(())
    }

    // ========== Tickets ==========

    /// Store a ticket and claim its human number
    pub fn put_ticket(&self, txn: &WriteTransaction, ticket: &Ticket) -> StorageResult<()> {
        let value = serde_json::to_vec(ticket)?;
        txn.open_table(TICKETS_TABLE)?
            .insert(ticket.id.as_str(), value.as_slice())?;
        txn.open_table(TICKET_NUMBERS_TABLE)?
            .insert(ticket.ticket_number.as_str(), ticket.id.as_str())?;
        Ok(())
    }

    pub fn get_ticket(&self, ticket_id: &str) -> StorageResult<Option<Ticket>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;
        read_json(&table, ticket_id)
    }

    pub fn get_ticket_by_number(&self, ticket_number: &str) -> StorageResult<Option<Ticket>> {
        let read_txn = self.db.begin_read()?;
        let numbers = read_txn.open_table(TICKET_NUMBERS_TABLE)?;
        let Some(ticket_id) = numbers.get(ticket_number)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };
        let tickets = read_txn.open_table(TICKETS_TABLE)?;
        read_json(&tickets, ticket_id.as_str())
    }

    /// Every stored ticket matching `filter`
    pub fn scan_tickets(&self, filter: impl Fn(&Ticket) -> bool) -> StorageResult<Vec<Ticket>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;

        let mut tickets = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let ticket: Ticket = serde_json::from_slice(value.value())?;
            if filter(&ticket) {
                tickets.push(ticket);
            }
        }
        Ok(tickets)
    }

    /// Whether a ticket number is already taken (within transaction)
    pub fn ticket_number_exists_txn(
        &self,
        txn: &WriteTransaction,
        ticket_number: &str,
    ) -> StorageResult<bool> {
        let table = txn.open_table(TICKET_NUMBERS_TABLE)?;
        Ok(table.get(ticket_number)?.is_some())
    }

    // ========== Ticket Sequence ==========

    /// Allocate the next human ticket number for `day`
    ///
    /// Increments the per-day counter inside the caller's transaction, so the
    /// number is only consumed if the caller commits. redb admits one writer
    /// at a time, which serializes concurrent checkouts on this counter.
    /// Numbers already present in `ticket_numbers` (restored data, manual
    /// edits) are skipped, at most `MAX_SEQUENCE_PROBES` of them.
    pub fn allocate_ticket_number(
        &self,
        txn: &WriteTransaction,
        day: NaiveDate,
    ) -> StorageResult<String> {
        let key = day_key(day);
        let prefix = day.format("%y%m%d").to_string();

        let mut sequence = self.current_sequence_txn(txn, key)?;
        let mut probes = 0;
        loop {
            sequence += 1;
            if sequence > MAX_DAILY_SEQUENCE {
                return Err(StorageError::SequenceExhausted(prefix));
            }
            let candidate = format!("{}{:03}", prefix, sequence);
            if !self.ticket_number_exists_txn(txn, &candidate)? {
                txn.open_table(DAILY_SEQUENCE_TABLE)?.insert(key, sequence)?;
                return Ok(candidate);
            }
            probes += 1;
            tracing::warn!(ticket_number = %candidate, probes, "Ticket number already taken, skipping");
            if probes >= MAX_SEQUENCE_PROBES {
                return Err(StorageError::SequenceContention(prefix));
            }
        }
    }

    fn current_sequence_txn(&self, txn: &WriteTransaction, key: u32) -> StorageResult<u64> {
        let table = txn.open_table(DAILY_SEQUENCE_TABLE)?;
        Ok(table.get(key)?.map(|g| g.value()).unwrap_or(0))
    }

    /// Last sequence issued for `day` (read-only)
    pub fn current_sequence(&self, day: NaiveDate) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DAILY_SEQUENCE_TABLE)?;
        Ok(table.get(day_key(day))?.map(|g| g.value()).unwrap_or(0))
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        Ok(StorageStats {
            table_count: read_txn.open_table(TABLES_TABLE)?.len()?,
            round_count: read_txn.open_table(ROUNDS_TABLE)?.len()?,
            open_round_count: read_txn.open_table(OPEN_ROUNDS_TABLE)?.len()?,
            ticket_count: read_txn.open_table(TICKETS_TABLE)?.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub table_count: u64,
    pub round_count: u64,
    pub open_round_count: u64,
    pub ticket_count: u64,
}

/// `YYMMDD` as an integer key, e.g. 2025-03-14 → 250314
fn day_key(day: NaiveDate) -> u32 {
    let yy = day.year().rem_euclid(100) as u32;
    yy * 10_000 + day.month() * 100 + day.day()
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn read_json<'a, K, T>(
    table: &impl ReadableTable<K, &'static [u8]>,
    key: impl std::borrow::Borrow<K::SelfType<'a>>,
) -> StorageResult<Option<T>>
where
    K: redb::Key + 'static,
    T: DeserializeOwned,
{
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn collect_open_rounds(
    index: &impl ReadableTable<(u32, &'static str), ()>,
    rounds: &impl ReadableTable<&'static str, &'static [u8]>,
    table_number: u32,
) -> StorageResult<Vec<Round>> {
    let mut result: Vec<Round> = Vec::new();
    for entry in index.range((table_number, "")..)? {
        let (key, _) = entry?;
        let (owner, round_id) = key.value();
        if owner != table_number {
            break;
        }
        let round: Option<Round> = read_json(rounds, round_id)?;
        result.extend(round);
    }
    result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(result)
}
