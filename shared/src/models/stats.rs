//! Accounting views over paid rounds

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Takings for one business day (archived rounds excluded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: Decimal,
    pub round_count: u64,
}

/// One day inside a monthly breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub total: Decimal,
    pub round_count: u64,
}

/// Takings for a calendar month, with per-day breakdown (days with sales only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
    pub round_count: u64,
    pub days: Vec<DayStats>,
}

/// Month total without the day breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
    pub round_count: u64,
}

impl From<&MonthlyStats> for MonthSummary {
    fn from(stats: &MonthlyStats) -> Self {
        Self {
            year: stats.year,
            month: stats.month,
            total: stats.total,
            round_count: stats.round_count,
        }
    }
}
