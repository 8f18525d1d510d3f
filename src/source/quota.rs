//! Daily quota bookkeeping for the metered backend

use crate::error::{Result, SourceError};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

/// Unit cost of a search call
pub const SEARCH_COST: u32 = 100;
/// Unit cost of a channel lookup by username
pub const CHANNEL_LOOKUP_COST: u32 = 1;
/// Unit cost of a video details lookup, per video id
pub const VIDEO_LOOKUP_COST: u32 = 1;

/// Snapshot of quota usage
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuotaUsage {
    /// Units spent since the last reset
    pub used: u32,
    /// Daily limit
    pub limit: u32,
    /// Units left today
    pub remaining: u32,
    /// Day the counter was last reset (UTC)
    pub reset_date: NaiveDate,
    /// `used / limit` as a percentage, two decimals
    pub percent_used: f64,
}

/// Units spent against a daily limit, reset when the UTC date changes
///
/// Owned by one [`ApiSource`](super::ApiSource); not shared process-wide.
#[derive(Debug)]
pub struct QuotaTracker {
    used: u32,
    limit: u32,
    reset_date: NaiveDate,
}

impl QuotaTracker {
    /// Start a fresh counter for `today`
    pub fn new(limit: u32, today: NaiveDate) -> Self {
        Self {
            used: 0,
            limit,
            reset_date: today,
        }
    }

    /// Fail with [`SourceError::QuotaExhausted`] if spending `cost` would exceed the limit
    pub fn check(&mut self, cost: u32, today: NaiveDate) -> Result<()> {
        self.roll_over(today);

        if self.used.saturating_add(cost) > self.limit {
            warn!(
                used = self.used,
                cost,
                limit = self.limit,
                "quota limit would be exceeded"
            );
            return Err(SourceError::QuotaExhausted {
                used: self.used,
                cost,
                limit: self.limit,
            }
            .into());
        }
        Ok(())
    }

    /// Record units actually spent
    pub fn record(&mut self, cost: u32) {
        self.used = self.used.saturating_add(cost);
    }

    /// Current usage as seen on `today`
    pub fn usage(&mut self, today: NaiveDate) -> QuotaUsage {
        self.roll_over(today);
        let percent = if self.limit == 0 {
            0.0
        } else {
            (f64::from(self.used) / f64::from(self.limit) * 10_000.0).round() / 100.0
        };
        QuotaUsage {
            used: self.used,
            limit: self.limit,
            remaining: self.limit.saturating_sub(self.used),
            reset_date: self.reset_date,
            percent_used: percent,
        }
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if today > self.reset_date {
            info!(previous = %self.reset_date, %today, "daily quota counter reset");
            self.used = 0;
            self.reset_date = today;
        }
    }
}
