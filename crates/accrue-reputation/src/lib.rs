//! # Accrue Reputation
//!
//! Bounded 0-1000 borrower score derived from repayment history.
//!
//! ## Scoring
//!
//! - New records start at [`DEFAULT_SCORE`]
//! - An on-time repayment closes a tenth of the gap to 1000 (at least one point)
//! - A late repayment removes a fifth of the current score (at least one point)
//!
//! Steps shrink as the score approaches either bound, and the score is always
//! clamped to `[0, 1000]`.

pub mod manager;
pub mod score;

pub use manager::ReputationManager;
pub use score::{ReputationRecord, DEFAULT_SCORE};
