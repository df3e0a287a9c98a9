//! CreditLine - one borrower's debt position
//!
//! A line holds no value; its collateral lives in the pool's collateral book and the
//! credit limit is recomputed from the pool on every check.

use accrue_common::math::accrue_interest;
use accrue_common::{Result, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    /// Collateral principal posted, reconciled with the pool after each operation
    pub initial_collateral: u64,
    pub borrowed_amount: u64,
    pub interest_accrued: u64,
    /// First draw of the current debt cycle; the grace window runs from here
    pub last_borrowed_at: Timestamp,
    pub last_interest_update: Timestamp,
    pub due_date: Timestamp,
    pub is_active: bool,
    /// Principal plus interest repaid over the line's lifetime
    pub total_repaid: u64,
    pub on_time_count: u64,
    pub late_count: u64,
}

impl CreditLine {
    pub fn open(collateral: u64, now: Timestamp) -> Self {
        Self {
            initial_collateral: collateral,
            borrowed_amount: 0,
            interest_accrued: 0,
            last_borrowed_at: 0,
            last_interest_update: now,
            due_date: 0,
            is_active: true,
            total_repaid: 0,
            on_time_count: 0,
            late_count: 0,
        }
    }

    /// `borrowed_amount + interest_accrued`
    #[inline]
    pub fn total_debt(&self) -> u64 {
        self.borrowed_amount.saturating_add(self.interest_accrued)
    }

    pub fn has_debt(&self) -> bool {
        self.total_debt() > 0
    }

    /// Interest owed for time since the last update, excluding the grace period
    ///
    /// Only time after `last_borrowed_at + grace_period` counts, and nothing accrues
    /// without borrowed principal.
    pub fn pending_interest(
        &self,
        annual_rate_bps: u64,
        grace_period: u64,
        now: Timestamp,
    ) -> Result<u64> {
        if self.borrowed_amount == 0 {
            return Ok(0);
        }
        let start = self
            .last_interest_update
            .max(self.last_borrowed_at.saturating_add(grace_period));
        let elapsed = now.saturating_sub(start);
        accrue_interest(self.borrowed_amount, annual_rate_bps, elapsed)
    }

    /// Fold pending interest into the line; returns the amount added
    pub fn accrue(&mut self, annual_rate_bps: u64, grace_period: u64, now: Timestamp) -> Result<u64> {
        let interest = self.pending_interest(annual_rate_bps, grace_period, now)?;
        self.interest_accrued = self.interest_accrued.saturating_add(interest);
        self.last_interest_update = self.last_interest_update.max(now);
        Ok(interest)
    }

    /// A repayment is on time at or before the due date
    pub fn is_on_time(&self, now: Timestamp) -> bool {
        now <= self.due_date
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.borrowed_amount > 0 && now > self.due_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_common::math::SECONDS_PER_YEAR;

    fn borrowed_line(amount: u64, at: Timestamp) -> CreditLine {
        let mut line = CreditLine::open(amount * 2, at);
        line.borrowed_amount = amount;
        line.last_borrowed_at = at;
        line
    }

    #[test]
    fn test_no_interest_without_debt() {
        let line = CreditLine::open(1_000, 0);
        assert_eq!(line.pending_interest(1_000, 0, SECONDS_PER_YEAR).unwrap(), 0);
    }

    #[test]
    fn test_grace_period_excluded() {
        let line = borrowed_line(1_000_000, 100);
        let grace = 1_000;

        assert_eq!(line.pending_interest(1_000, grace, 1_100).unwrap(), 0);
        // one full year after the grace period at 10%
        let now = 1_100 + SECONDS_PER_YEAR;
        assert_eq!(line.pending_interest(1_000, grace, now).unwrap(), 100_000);
    }

    #[test]
    fn test_accrue_advances_checkpoint() {
        let mut line = borrowed_line(1_000_000, 0);
        let half_year = SECONDS_PER_YEAR / 2;

        assert_eq!(line.accrue(1_000, 0, half_year).unwrap(), 50_000);
        assert_eq!(line.last_interest_update, half_year);
        assert_eq!(line.accrue(1_000, 0, half_year).unwrap(), 0);
        assert_eq!(line.accrue(1_000, 0, SECONDS_PER_YEAR).unwrap(), 50_000);
        assert_eq!(line.total_debt(), 1_100_000);
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut line = borrowed_line(1_000, 500);
        line.last_interest_update = 500;
        assert_eq!(line.accrue(1_000, 0, 400).unwrap(), 0);
        assert_eq!(line.last_interest_update, 500);
    }

    #[test]
    fn test_due_date_boundary() {
        let mut line = borrowed_line(10, 0);
        line.due_date = 1_000;
        assert!(line.is_on_time(1_000));
        assert!(!line.is_overdue(1_000));
        assert!(line.is_overdue(1_001));

        line.borrowed_amount = 0;
        assert!(!line.is_overdue(5_000));
    }
}
