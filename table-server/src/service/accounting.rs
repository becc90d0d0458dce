//! Accounting: takings over paid rounds
//!
//! Days are business-local dates of `paid_at`. Archiving a day only hides it
//! from the daily view; monthly figures keep counting archived rounds.

use super::error::{ServiceError, ServiceResult};
use super::money;
use super::{TableService, commit};
use crate::utils::time;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::models::{DailyStats, DayStats, MonthSummary, MonthlyStats, Round};
use std::collections::BTreeMap;

/// Longest history `previous_months` will report
pub const MAX_PREVIOUS_MONTHS: u32 = 24;

impl TableService {
    /// Takings of one business day, archived rounds excluded
    pub fn daily_stats(&self, date: NaiveDate) -> ServiceResult<DailyStats> {
        let tz = self.tz;
        let rounds = self
            .storage
            .scan_rounds(|r| !r.archived && paid_on(r, tz) == Some(date))?;
        let (total, round_count) = takings(&rounds);
        Ok(DailyStats {
            date,
            total,
            round_count,
        })
    }

    /// Archive the paid rounds of a business day, returns how many
    ///
    /// Only the daily view resets; rounds and tickets stay stored.
    pub fn reset_daily_stats(&self, date: NaiveDate) -> ServiceResult<usize> {
        let tz = self.tz;
        let txn = self.storage.begin_write()?;
        let rounds = self
            .storage
            .scan_rounds_txn(&txn, |r| !r.archived && paid_on(r, tz) == Some(date))?;
        for mut round in rounds.iter().cloned() {
            round.archived = true;
            self.storage.put_round(&txn, &round)?;
        }
        commit(txn)?;

        tracing::info!(%date, rounds = rounds.len(), "Daily stats reset");
        Ok(rounds.len())
    }

    /// Takings of a calendar month with a per-day breakdown
    pub fn monthly_stats(&self, year: i32, month: u32) -> ServiceResult<MonthlyStats> {
        if time::month_start(year, month).is_none() {
            return Err(ServiceError::Validation(format!(
                "invalid month {}-{}",
                year, month
            )));
        }
        let tz = self.tz;
        let rounds = self.storage.scan_rounds(|r| {
            paid_on(r, tz).is_some_and(|d| time::year_month(d) == (year, month))
        })?;
        Ok(month_breakdown(year, month, &rounds, tz))
    }

    /// Totals of the `count` months before the current one, newest first
    pub fn previous_months(&self, count: u32) -> ServiceResult<Vec<MonthSummary>> {
        if count == 0 || count > MAX_PREVIOUS_MONTHS {
            return Err(ServiceError::Validation(format!(
                "month count must be between 1 and {}",
                MAX_PREVIOUS_MONTHS
            )));
        }
        let tz = self.tz;
        let (mut year, mut month) = time::year_month(time::today(tz));
        let mut wanted = Vec::with_capacity(count as usize);
        for _ in 0..count {
            (year, month) = time::previous_month(year, month);
            wanted.push((year, month));
        }

        let rounds = self.storage.scan_rounds(|r| {
            paid_on(r, tz).is_some_and(|d| wanted.contains(&time::year_month(d)))
        })?;
        let mut by_month: BTreeMap<(i32, u32), Vec<Round>> = BTreeMap::new();
        for round in rounds {
            if let Some(day) = paid_on(&round, tz) {
                by_month.entry(time::year_month(day)).or_default().push(round);
            }
        }

        Ok(wanted
            .iter()
            .map(|&(y, m)| {
                let rounds = by_month.get(&(y, m)).map(Vec::as_slice).unwrap_or(&[]);
                MonthSummary::from(&month_breakdown(y, m, rounds, tz))
            })
            .collect())
    }
}

fn paid_on(round: &Round, tz: chrono_tz::Tz) -> Option<NaiveDate> {
    match (round.is_paid, round.paid_at) {
        (true, Some(paid_at)) => Some(time::local_date(paid_at, tz)),
        _ => None,
    }
}

fn takings(rounds: &[Round]) -> (Decimal, u64) {
    let total = money::round_money(rounds.iter().map(Round::total).sum::<Decimal>());
    (total, rounds.len() as u64)
}

fn month_breakdown(year: i32, month: u32, rounds: &[Round], tz: chrono_tz::Tz) -> MonthlyStats {
    let mut days: BTreeMap<NaiveDate, (Decimal, u64)> = BTreeMap::new();
    for round in rounds {
        if let Some(day) = paid_on(round, tz) {
            let entry = days.entry(day).or_insert((Decimal::ZERO, 0));
            entry.0 += round.total();
            entry.1 += 1;
        }
    }
    let (total, round_count) = takings(rounds);
    MonthlyStats {
        year,
        month,
        total,
        round_count,
        days: days
            .into_iter()
            .map(|(date, (total, round_count))| DayStats {
                date,
                total: money::round_money(total),
                round_count,
            })
            .collect(),
    }
}
