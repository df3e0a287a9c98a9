//! # Accrue Pool
//!
//! The shared liquidity ledger: lender deposits, borrower collateral (which is itself
//! a pool deposit and earns interest), borrows paid straight to recipients, and
//! repayments whose interest is skimmed for the protocol fee and fanned out to every
//! depositor.
//!
//! ## Accounting
//!
//! ```text
//! store_balance + outstanding + bad_debt
//!     >= deposits + collateral + unclaimed interest + protocol fees
//! ```
//!
//! The gap is rounding dust and forfeited collateral interest, both retained by the pool.

pub mod book;
pub mod distribution;
pub mod pool;

pub use book::{DepositBook, DepositRecord, Namespace};
pub use distribution::{apply_distribution, plan_distribution, DistributionPlan};
pub use pool::{LendingPool, PoolSnapshot, PoolStats, RepaymentSplit, Seizure};
