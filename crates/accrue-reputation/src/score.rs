//! ReputationRecord - per-user repayment history and derived score
//!
//! The score affects:
//! - Credit limits (borrowers at or above the credit manager's threshold get the multiplier)
//! - Nothing else inside the core; it is exposed read-only to clients

use accrue_common::{Timestamp, MAX_REPUTATION_SCORE, MIN_REPUTATION_SCORE};
use serde::{Deserialize, Serialize};

/// Starting score for new borrowers
pub const DEFAULT_SCORE: u16 = 500;

/// Fraction of the remaining headroom gained per on-time repayment
const ON_TIME_DIVISOR: u16 = 10;

/// Fraction of the current score lost per late repayment
const LATE_DIVISOR: u16 = 5;

/// Repayment history for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub on_time_payments: u64,
    pub late_payments: u64,
    /// Sum of all repaid amounts (principal and interest)
    pub total_repaid: u64,
    pub last_activity: Timestamp,
    /// Composite score from 0-1000
    pub score: u16,
}

impl ReputationRecord {
    pub fn new(now: Timestamp) -> Self {
        Self {
            on_time_payments: 0,
            late_payments: 0,
            total_repaid: 0,
            last_activity: now,
            score: DEFAULT_SCORE,
        }
    }

    /// Apply one repayment event
    pub fn record_repayment(&mut self, on_time: bool, amount: u64, now: Timestamp) {
        if on_time {
            self.on_time_payments += 1;
        } else {
            self.late_payments += 1;
        }
        self.total_repaid = self.total_repaid.saturating_add(amount);
        self.last_activity = now;
        self.score = next_score(self.score, on_time);
    }

    /// Normalized score (0.0 - 1.0)
    #[inline]
    pub fn tau(&self) -> f64 {
        self.score as f64 / MAX_REPUTATION_SCORE as f64
    }

    pub fn meets_threshold(&self, min_score: u16) -> bool {
        self.score >= min_score
    }

    pub fn total_payments(&self) -> u64 {
        self.on_time_payments + self.late_payments
    }
}

/// Monotone scoring step: up on time, down when late, clamped to `[0, 1000]`
pub fn next_score(score: u16, on_time: bool) -> u16 {
    let score = score.min(MAX_REPUTATION_SCORE);
    if on_time {
        let step = ((MAX_REPUTATION_SCORE - score) / ON_TIME_DIVISOR).max(1);
        score.saturating_add(step).min(MAX_REPUTATION_SCORE)
    } else {
        let step = (score / LATE_DIVISOR).max(1);
        score.saturating_sub(step).max(MIN_REPUTATION_SCORE)
    }
}

impl std::fmt::Display for ReputationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reputation({}/1000, on_time={}, late={})",
            self.score, self.on_time_payments, self.late_payments
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_record() {
        let record = ReputationRecord::new(42);
        assert_eq!(record.score, DEFAULT_SCORE);
        assert_eq!(record.total_payments(), 0);
        assert_eq!(record.last_activity, 42);
    }

    #[test]
    fn test_on_time_steps() {
        assert_eq!(next_score(500, true), 550);
        assert_eq!(next_score(550, true), 595);
        assert_eq!(next_score(995, true), 996);
        assert_eq!(next_score(1000, true), 1000);
    }

    #[test]
    fn test_late_steps() {
        assert_eq!(next_score(500, false), 400);
        assert_eq!(next_score(4, false), 3);
        assert_eq!(next_score(0, false), 0);
    }

    #[test]
    fn test_record_repayment() {
        let mut record = ReputationRecord::new(0);
        record.record_repayment(true, 100, 10);
        record.record_repayment(false, 50, 20);

        assert_eq!(record.on_time_payments, 1);
        assert_eq!(record.late_payments, 1);
        assert_eq!(record.total_repaid, 150);
        assert_eq!(record.last_activity, 20);
        assert_eq!(record.score, 440);
    }

    #[test]
    fn test_tau() {
        let mut record = ReputationRecord::new(0);
        record.score = 1000;
        assert!((record.tau() - 1.0).abs() < 0.001);
    }

    proptest! {
        #[test]
        fn prop_score_bounded_and_directional(events in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut score = DEFAULT_SCORE;
            for on_time in events {
                let next = next_score(score, on_time);
                if on_time {
                    prop_assert!(next >= score);
                } else {
                    prop_assert!(next <= score);
                }
                prop_assert!(next <= MAX_REPUTATION_SCORE);
                score = next;
            }
        }
    }
}
