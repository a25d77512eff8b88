//! Token usage accounting with daily and monthly limits
//!
//! Counters roll over on UTC calendar boundaries. The ledger is persisted
//! alongside the snapshot cache as `tokenStats`.

use crate::config::LimitsConfig;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Accounting period a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPeriod {
    Daily,
    Monthly,
}

impl fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitPeriod::Daily => f.write_str("daily"),
            LimitPeriod::Monthly => f.write_str("monthly"),
        }
    }
}

/// Token budget errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("{period} token limit reached: {used} used + {requested} requested > {limit}")]
    LimitExceeded {
        period: LimitPeriod,
        used: u64,
        requested: u64,
        limit: u64,
    },
}

/// Running token usage counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageLedger {
    /// Day the daily counter belongs to
    day: NaiveDate,
    daily_used: u64,
    /// First day of the month the monthly counter belongs to
    month: NaiveDate,
    monthly_used: u64,
    total_used: u64,
    requests: u64,
    #[serde(skip)]
    limits: LimitsConfig,
}

impl TokenUsageLedger {
    pub fn new(limits: LimitsConfig) -> Self {
        Self::starting_at(limits, Utc::now())
    }

    pub fn starting_at(limits: LimitsConfig, now: DateTime<Utc>) -> Self {
        let day = now.date_naive();
        Self {
            day,
            daily_used: 0,
            month: month_start(day),
            monthly_used: 0,
            total_used: 0,
            requests: 0,
            limits,
        }
    }

    /// Replace the limits, e.g. after loading persisted counters
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn daily_used(&self) -> u64 {
        self.daily_used
    }

    pub fn monthly_used(&self) -> u64 {
        self.monthly_used
    }

    pub fn total_used(&self) -> u64 {
        self.total_used
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn remaining_today(&self) -> u64 {
        self.limits.daily_tokens.saturating_sub(self.daily_used)
    }

    /// Check whether `tokens` more would fit in both periods
    pub fn check(&mut self, tokens: u64) -> Result<(), BudgetError> {
        self.check_at(tokens, Utc::now())
    }

    pub fn check_at(&mut self, tokens: u64, now: DateTime<Utc>) -> Result<(), BudgetError> {
        self.roll(now);

        if self.daily_used + tokens > self.limits.daily_tokens {
            return Err(BudgetError::LimitExceeded {
                period: LimitPeriod::Daily,
                used: self.daily_used,
                requested: tokens,
                limit: self.limits.daily_tokens,
            });
        }
        if self.monthly_used + tokens > self.limits.monthly_tokens {
            return Err(BudgetError::LimitExceeded {
                period: LimitPeriod::Monthly,
                used: self.monthly_used,
                requested: tokens,
                limit: self.limits.monthly_tokens,
            });
        }
        Ok(())
    }

    /// Count tokens that were handed out
    pub fn record(&mut self, tokens: u64) {
        self.record_at(tokens, Utc::now());
    }

    pub fn record_at(&mut self, tokens: u64, now: DateTime<Utc>) {
        self.roll(now);
        self.daily_used += tokens;
        self.monthly_used += tokens;
        self.total_used += tokens;
        self.requests += 1;
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            self.day = today;
            self.daily_used = 0;
        }
        let month = month_start(today);
        if month != self.month {
            self.month = month;
            self.monthly_used = 0;
        }
    }
}

impl Default for TokenUsageLedger {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
