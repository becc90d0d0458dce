//! Round store: ordering, amending, paying and clearing rounds
//!
//! A round is mutable until paid. Catalog name and price are snapshotted
//! into every new line, so later catalog edits never touch history.

use super::error::{ServiceError, ServiceResult};
use super::locks::TableGuard;
use super::money;
use super::{TableService, commit};
use crate::message::{SignalKind, Topic};
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{LineItem, LineItemInput, Round, TableRounds};
use shared::util::{new_id, now_millis};
use std::collections::HashSet;

/// Re-resolutions of a round's table before giving up
const LOCK_ROUND_ATTEMPTS: usize = 3;

impl TableService {
    /// Open a new round on a live table
    pub async fn open_round(
        &self,
        table_number: u32,
        line_items: Vec<LineItemInput>,
    ) -> ServiceResult<Round> {
        validate_inputs(&line_items, false)?;
        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;
        let lines = self.resolve_lines(&line_items).await?;

        let mut round = Round {
            id: new_id(),
            table_number,
            line_items: lines,
            is_paid: false,
            is_service_confirmed: false,
            created_at: now_millis(),
            paid_at: None,
            archived: false,
        };

        let txn = self.storage.begin_write()?;
        let confirmed = self.storage.is_service_confirmed_txn(&txn, table_number)?;
        self.storage.put_round(&txn, &round)?;
        commit(txn)?;
        round.is_service_confirmed = confirmed;

        tracing::info!(table_number, round_id = %round.id, lines = round.line_items.len(), "Round opened");
        self.notify(Topic::RoundsUpdate, table_number, SignalKind::RoundOpened);
        Ok(round)
    }

    /// Add lines to an open round
    pub async fn append_line_items(
        &self,
        round_id: &str,
        line_items: Vec<LineItemInput>,
    ) -> ServiceResult<Round> {
        validate_inputs(&line_items, false)?;
        let (_guard, mut round) = self.lock_round(round_id).await?;
        if round.is_paid {
            return Err(ServiceError::RoundAlreadyPaid(round.id));
        }
        let lines = self.resolve_lines(&line_items).await?;
        round.line_items.extend(lines);

        let txn = self.storage.begin_write()?;
        round.is_service_confirmed = self.storage.is_service_confirmed_txn(&txn, round.table_number)?;
        self.storage.put_round(&txn, &round)?;
        commit(txn)?;

        tracing::info!(table_number = round.table_number, round_id = %round.id, added = line_items.len(), "Line items appended");
        self.notify(Topic::RoundsUpdate, round.table_number, SignalKind::ItemsAppended);
        Ok(round)
    }

    /// Replace every line of an open round
    ///
    /// An input carrying the `line_id` of an existing line keeps that line's
    /// recorded name and price and only takes the new quantity (and variant,
    /// when given). Inputs without `line_id` are ordered fresh.
    pub async fn replace_line_items(
        &self,
        round_id: &str,
        line_items: Vec<LineItemInput>,
    ) -> ServiceResult<Round> {
        validate_inputs(&line_items, true)?;
        let (_guard, mut round) = self.lock_round(round_id).await?;
        if round.is_paid {
            return Err(ServiceError::RoundAlreadyPaid(round.id));
        }

        let mut lines = Vec::with_capacity(line_items.len());
        for input in &line_items {
            match input.line_id.as_deref() {
                Some(line_id) => {
                    let existing =
                        round
                            .find_line(line_id)
                            .ok_or_else(|| ServiceError::LineItemNotFound {
                                round_id: round.id.clone(),
                                line_id: line_id.to_string(),
                            })?;
                    lines.push(LineItem {
                        quantity: input.quantity,
                        variant: clean_variant(input.variant.as_deref())
                            .or_else(|| existing.variant.clone()),
                        ..existing.clone()
                    });
                }
                None => lines.push(self.resolve_line(input).await?),
            }
        }
        round.line_items = lines;

        let txn = self.storage.begin_write()?;
        round.is_service_confirmed = self.storage.is_service_confirmed_txn(&txn, round.table_number)?;
        self.storage.put_round(&txn, &round)?;
        commit(txn)?;

        tracing::info!(table_number = round.table_number, round_id = %round.id, lines = round.line_items.len(), "Line items replaced");
        self.notify(Topic::RoundsUpdate, round.table_number, SignalKind::ItemsReplaced);
        Ok(round)
    }

    /// Mark the table's order as served
    ///
    /// The flag is per table and stays set until the table is fully paid or
    /// cleaned. Confirming an already confirmed table is a no-op.
    pub async fn confirm_service(&self, table_number: u32) -> ServiceResult<()> {
        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;

        let txn = self.storage.begin_write()?;
        if self.storage.open_rounds_txn(&txn, table_number)?.is_empty() {
            return Err(ServiceError::NoOpenRounds(table_number));
        }
        let already = self.storage.is_service_confirmed_txn(&txn, table_number)?;
        if !already {
            self.storage.set_service_confirmed(&txn, table_number, true)?;
        }
        commit(txn)?;

        if !already {
            tracing::info!(table_number, "Service confirmed");
            self.notify(Topic::RoundsUpdate, table_number, SignalKind::ServiceConfirmed);
        }
        Ok(())
    }

    /// Mark a single round paid (no ticket)
    ///
    /// Idempotent: paying a paid round returns it unchanged.
    pub async fn mark_paid(&self, round_id: &str) -> ServiceResult<Round> {
        let (_guard, mut round) = self.lock_round(round_id).await?;
        if round.is_paid {
            return Ok(round);
        }
        let table_number = round.table_number;

        let txn = self.storage.begin_write()?;
        round.is_service_confirmed = self.storage.is_service_confirmed_txn(&txn, table_number)?;
        round.is_paid = true;
        round.paid_at = Some(now_millis());
        self.storage.put_round(&txn, &round)?;
        self.reset_service_if_free(&txn, table_number)?;
        commit(txn)?;

        tracing::info!(table_number, round_id = %round.id, "Round paid");
        self.notify(Topic::RoundsUpdate, table_number, SignalKind::RoundPaid);
        Ok(round)
    }

    /// Mark every open round of a table paid, returns how many
    pub async fn mark_all_paid_for_table(&self, table_number: u32) -> ServiceResult<usize> {
        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;

        let txn = self.storage.begin_write()?;
        let rounds = self.storage.open_rounds_txn(&txn, table_number)?;
        let confirmed = self.storage.is_service_confirmed_txn(&txn, table_number)?;
        let now = now_millis();
        for mut round in rounds.iter().cloned() {
            round.is_paid = true;
            round.paid_at = Some(now);
            round.is_service_confirmed = confirmed;
            self.storage.put_round(&txn, &round)?;
        }
        self.storage.set_service_confirmed(&txn, table_number, false)?;
        commit(txn)?;

        let count = rounds.len();
        if count > 0 {
            tracing::info!(table_number, rounds = count, "Table paid");
            self.notify(Topic::RoundsUpdate, table_number, SignalKind::TablePaid);
        }
        Ok(count)
    }

    /// Clean a table: delete its unpaid rounds, returns how many
    ///
    /// Irreversible. Paid rounds are never touched.
    pub async fn delete_open_rounds_for_table(&self, table_number: u32) -> ServiceResult<usize> {
        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;

        let txn = self.storage.begin_write()?;
        let rounds = self.storage.open_rounds_txn(&txn, table_number)?;
        for round in &rounds {
            self.storage.remove_round(&txn, round)?;
        }
        self.storage.set_service_confirmed(&txn, table_number, false)?;
        commit(txn)?;

        let count = rounds.len();
        if count > 0 {
            tracing::info!(table_number, rounds = count, "Table cleaned");
            self.notify(Topic::RoundsUpdate, table_number, SignalKind::TableCleaned);
        }
        Ok(count)
    }

    // ========== Queries ==========

    /// Open rounds of a table, oldest first, with their summed total
    pub fn table_rounds(&self, table_number: u32) -> ServiceResult<TableRounds> {
        self.get_table(table_number)?;
        let (_, confirmed) = self.storage.occupancy(table_number)?;
        let mut rounds = self.storage.open_rounds(table_number)?;
        for round in &mut rounds {
            round.is_service_confirmed = confirmed;
        }
        let total = money::round_money(rounds.iter().map(Round::total).sum::<Decimal>());
        Ok(TableRounds {
            table_number,
            rounds,
            total,
        })
    }

    pub fn get_round(&self, round_id: &str) -> ServiceResult<Round> {
        let mut round = self
            .storage
            .get_round(round_id)?
            .ok_or_else(|| ServiceError::RoundNotFound(round_id.to_string()))?;
        if !round.is_paid {
            round.is_service_confirmed = self.storage.occupancy(round.table_number)?.1;
        }
        Ok(round)
    }

    /// Paid rounds recorded under a table number, oldest payment first
    ///
    /// Works for deleted tables too.
    pub fn paid_rounds_for_table(&self, table_number: u32) -> ServiceResult<Vec<Round>> {
        let mut rounds = self
            .storage
            .scan_rounds(|r| r.is_paid && r.table_number == table_number)?;
        rounds.sort_by_key(|r| (r.paid_at, r.created_at));
        Ok(rounds)
    }

    // ========== Helpers ==========

    /// Lock the table owning a round and return the round as seen under the lock
    ///
    /// Re-resolves when a concurrent move re-pointed the round while waiting,
    /// giving up after a few attempts.
    pub(super) async fn lock_round(&self, round_id: &str) -> ServiceResult<(TableGuard, Round)> {
        for _ in 0..LOCK_ROUND_ATTEMPTS {
            let seen = self
                .storage
                .get_round(round_id)?
                .ok_or_else(|| ServiceError::RoundNotFound(round_id.to_string()))?;
            let guard = self.locks.lock(seen.table_number).await;
            let current = self
                .storage
                .get_round(round_id)?
                .ok_or_else(|| ServiceError::RoundNotFound(round_id.to_string()))?;
            if current.table_number == seen.table_number {
                return Ok((guard, current));
            }
            tracing::debug!(round_id, from = seen.table_number, to = current.table_number, "Round moved while waiting, retrying");
        }
        tracing::warn!(round_id, attempts = LOCK_ROUND_ATTEMPTS, "Round kept moving, giving up");
        Err(ServiceError::InvalidState(format!(
            "round {} kept moving between tables",
            round_id
        )))
    }

    /// Clear the service flag once a table has no open round left
    pub(super) fn reset_service_if_free(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
    ) -> ServiceResult<()> {
        if self.storage.open_rounds_txn(txn, table_number)?.is_empty() {
            self.storage.set_service_confirmed(txn, table_number, false)?;
        }
        Ok(())
    }

    async fn resolve_lines(&self, inputs: &[LineItemInput]) -> ServiceResult<Vec<LineItem>> {
        let mut lines = Vec::with_capacity(inputs.len());
        for input in inputs {
            lines.push(self.resolve_line(input).await?);
        }
        Ok(lines)
    }

    /// Snapshot one input into a line item
    ///
    /// Known catalog items contribute their current name and price. Unknown
    /// ids fall back to the caller's name and price (blank and zero when
    /// missing) instead of failing.
    async fn resolve_line(&self, input: &LineItemInput) -> ServiceResult<LineItem> {
        let (name, unit_price) = match input.catalog_item_id.as_deref() {
            Some(id) => match self.catalog.lookup_item(id).await {
                Some(item) if !item.available => {
                    return Err(ServiceError::Validation(format!(
                        "catalog item {} is not available",
                        id
                    )));
                }
                Some(item) => (item.name, item.price),
                None => {
                    tracing::debug!(catalog_item_id = id, "Catalog item not found, using supplied name and price");
                    fallback_fields(input)
                }
            },
            None => custom_fields(input)?,
        };
        money::validate_price(unit_price)?;

        Ok(LineItem {
            line_id: new_id(),
            catalog_item_id: input.catalog_item_id.clone(),
            name,
            quantity: input.quantity,
            unit_price,
            variant: clean_variant(input.variant.as_deref()),
        })
    }
}

fn validate_inputs(inputs: &[LineItemInput], allow_line_ids: bool) -> ServiceResult<()> {
    if inputs.is_empty() {
        return Err(ServiceError::validation("line items must not be empty"));
    }
    let mut seen = HashSet::new();
    for input in inputs {
        money::validate_line_input(input)?;
        if let Some(line_id) = input.line_id.as_deref() {
            if !allow_line_ids {
                return Err(ServiceError::validation(
                    "line_id is only accepted when replacing line items",
                ));
            }
            if !seen.insert(line_id) {
                return Err(ServiceError::Validation(format!(
                    "line {} listed more than once",
                    line_id
                )));
            }
        }
    }
    Ok(())
}

fn custom_fields(input: &LineItemInput) -> ServiceResult<(String, Decimal)> {
    let name = input.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    match (name, input.price) {
        (Some(name), Some(price)) => Ok((name.to_string(), price)),
        _ => Err(ServiceError::validation(
            "line item needs a known catalog item or a name and a price",
        )),
    }
}

fn fallback_fields(input: &LineItemInput) -> (String, Decimal) {
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    (name.to_string(), input.price.unwrap_or(Decimal::ZERO))
}

fn clean_variant(variant: Option<&str>) -> Option<String> {
    variant
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
