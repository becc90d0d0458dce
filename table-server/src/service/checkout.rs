//! Checkout & ticketing
//!
//! # Checkout Flow
//!
//! ```text
//! pay_and_issue_ticket(table, round_ids, method)
//!     ├─ 1. Lock table
//!     ├─ 2. Load rounds, check ownership and unpaid state
//!     ├─ 3. Snapshot lines, total from recorded prices
//!     ├─ 4. Allocate YYMMDD + NNN (same transaction)
//!     ├─ 5. Persist ticket, mark rounds paid
//!     └─ 6. Commit, then signal
//! ```
//!
//! Selective payment shrinks the origin rounds and pays a synthesized round
//! holding just the selected quantities, all in one transaction.

use super::error::{ServiceError, ServiceResult};
use super::money;
use super::{TableService, commit};
use crate::message::{SignalKind, Topic};
use crate::utils::time;
use chrono::NaiveDate;
use redb::WriteTransaction;
use shared::models::{PaymentMethod, Round, SelectedItem, Ticket};
use shared::util::{new_id, now_millis};
use std::collections::{BTreeMap, HashMap, HashSet};

impl TableService {
    /// Pay whole rounds of a table and issue one ticket for them
    pub async fn pay_and_issue_ticket(
        &self,
        table_number: u32,
        round_ids: &[String],
        payment_method: PaymentMethod,
    ) -> ServiceResult<Ticket> {
        if round_ids.is_empty() {
            return Err(ServiceError::validation("at least one round is required"));
        }
        let mut unique = HashSet::new();
        if let Some(dup) = round_ids.iter().find(|id| !unique.insert(id.as_str())) {
            return Err(ServiceError::Validation(format!("round {} listed more than once", dup)));
        }

        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;

        let txn = self.storage.begin_write()?;
        let mut rounds = Vec::with_capacity(round_ids.len());
        for round_id in round_ids {
            rounds.push(self.load_payable_round(&txn, table_number, round_id)?);
        }
        let ticket = self.issue_ticket(&txn, table_number, rounds, payment_method)?;
        commit(txn)?;

        tracing::info!(
            table_number,
            ticket_number = %ticket.ticket_number,
            total = %ticket.total,
            rounds = ticket.source_round_ids.len(),
            "Ticket issued"
        );
        self.notify(Topic::RoundsUpdate, table_number, SignalKind::TicketIssued);
        Ok(ticket)
    }

    /// Pay a subset of a table's ordered items
    ///
    /// Selected quantities are removed from their origin rounds (a round left
    /// without lines is deleted) and paid as one synthesized round, which is
    /// the ticket's only source. All-or-nothing.
    pub async fn pay_selected_items(
        &self,
        table_number: u32,
        items: &[SelectedItem],
        payment_method: PaymentMethod,
    ) -> ServiceResult<Ticket> {
        if items.is_empty() {
            return Err(ServiceError::validation("at least one item must be selected"));
        }
        // Same line selected twice adds up
        let mut selection: BTreeMap<(&str, &str), u32> = BTreeMap::new();
        let mut order: Vec<(&str, &str)> = Vec::new();
        for item in items {
            money::validate_quantity(item.quantity)?;
            let key = (item.round_id.as_str(), item.line_id.as_str());
            let entry = selection.entry(key).or_insert_with(|| {
                order.push(key);
                0
            });
            *entry = entry.saturating_add(item.quantity);
        }

        let _guard = self.locks.lock(table_number).await;
        self.get_table(table_number)?;

        let txn = self.storage.begin_write()?;
        let mut origins: HashMap<&str, Round> = HashMap::new();
        let mut paid_lines = Vec::with_capacity(order.len());
        for (round_id, line_id) in order {
            if !origins.contains_key(round_id) {
                let round = self.load_payable_round(&txn, table_number, round_id)?;
                origins.insert(round_id, round);
            }
            let Some(origin) = origins.get_mut(round_id) else {
                continue;
            };
            let requested = selection[&(round_id, line_id)];
            let Some(line) = origin.line_items.iter_mut().find(|l| l.line_id == line_id) else {
                return Err(ServiceError::LineItemNotFound {
                    round_id: round_id.to_string(),
                    line_id: line_id.to_string(),
                });
            };
            if requested > line.quantity {
                return Err(ServiceError::InsufficientQuantity {
                    line_id: line_id.to_string(),
                    requested,
                    available: line.quantity,
                });
            }
            let mut paid = line.clone();
            paid.quantity = requested;
            line.quantity -= requested;
            paid_lines.push(paid);
        }

        // Shrink origins before paying so the table's remaining open rounds are final
        for origin in origins.values_mut() {
            origin.line_items.retain(|l| l.quantity > 0);
            if origin.line_items.is_empty() {
                self.storage.remove_round(&txn, origin)?;
            } else {
                self.storage.put_round(&txn, origin)?;
            }
        }

        let synthetic = Round {
            id: new_id(),
            table_number,
            line_items: paid_lines,
            is_paid: false,
            is_service_confirmed: false,
            created_at: now_millis(),
            paid_at: None,
            archived: false,
        };
        let ticket = self.issue_ticket(&txn, table_number, vec![synthetic], payment_method)?;
        commit(txn)?;

        tracing::info!(
            table_number,
            ticket_number = %ticket.ticket_number,
            total = %ticket.total,
            lines = ticket.items.len(),
            "Selective payment ticket issued"
        );
        self.notify(Topic::RoundsUpdate, table_number, SignalKind::TicketIssued);
        Ok(ticket)
    }

    // ========== Ticket queries ==========

    pub fn get_ticket(&self, ticket_id: &str) -> ServiceResult<Ticket> {
        self.storage
            .get_ticket(ticket_id)?
            .ok_or_else(|| ServiceError::TicketNotFound(ticket_id.to_string()))
    }

    pub fn get_ticket_by_number(&self, ticket_number: &str) -> ServiceResult<Ticket> {
        self.storage
            .get_ticket_by_number(ticket_number)?
            .ok_or_else(|| ServiceError::TicketNotFound(ticket_number.to_string()))
    }

    /// Tickets issued on a business day, newest first
    pub fn daily_tickets(&self, date: NaiveDate) -> ServiceResult<Vec<Ticket>> {
        let tz = self.tz;
        let mut tickets = self
            .storage
            .scan_tickets(|t| time::local_date(t.created_at, tz) == date)?;
        sort_newest_first(&mut tickets);
        Ok(tickets)
    }

    /// Every ticket issued for a table number, newest first
    pub fn tickets_for_table(&self, table_number: u32) -> ServiceResult<Vec<Ticket>> {
        let mut tickets = self
            .storage
            .scan_tickets(|t| t.table_number == table_number)?;
        sort_newest_first(&mut tickets);
        Ok(tickets)
    }

    // ========== Helpers ==========

    /// Load a round for payment: must exist, belong to the table and be open
    fn load_payable_round(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
        round_id: &str,
    ) -> ServiceResult<Round> {
        let round = self
            .storage
            .get_round_txn(txn, round_id)?
            .ok_or_else(|| ServiceError::RoundNotFound(round_id.to_string()))?;
        if round.table_number != table_number {
            return Err(ServiceError::Validation(format!(
                "round {} does not belong to table {}",
                round_id, table_number
            )));
        }
        if round.is_paid {
            return Err(ServiceError::RoundAlreadyPaid(round.id));
        }
        Ok(round)
    }

    /// Snapshot, number and persist a ticket, then mark its rounds paid
    fn issue_ticket(
        &self,
        txn: &WriteTransaction,
        table_number: u32,
        rounds: Vec<Round>,
        payment_method: PaymentMethod,
    ) -> ServiceResult<Ticket> {
        let now = now_millis();
        let items: Vec<_> = rounds
            .iter()
            .flat_map(|r| r.line_items.iter())
            .map(money::ticket_line)
            .collect();
        let total = money::sum_lines(rounds.iter().flat_map(|r| r.line_items.iter()));

        let ticket_number = self
            .storage
            .allocate_ticket_number(txn, time::local_date(now, self.tz))?;
        let ticket = Ticket {
            id: new_id(),
            ticket_number,
            table_number,
            items,
            total,
            payment_method,
            source_round_ids: rounds.iter().map(|r| r.id.clone()).collect(),
            created_at: now,
        };
        self.storage.put_ticket(txn, &ticket)?;

        let confirmed = self.storage.is_service_confirmed_txn(txn, table_number)?;
        for mut round in rounds {
            round.is_paid = true;
            round.paid_at = Some(now);
            round.is_service_confirmed = confirmed;
            self.storage.put_round(txn, &round)?;
        }
        self.reset_service_if_free(txn, table_number)?;
        Ok(ticket)
    }
}

fn sort_newest_first(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.ticket_number.cmp(&a.ticket_number))
    });
}
