//! # Accrue Credit
//!
//! Borrower credit lines on top of the Accrue pool.
//!
//! A line's collateral is a deposit in the pool's collateral book, so it earns the same
//! interest lenders do and the credit limit grows without any transaction:
//!
//! ```text
//! credit_limit = collateral_principal + collateral_interest        (score <  threshold)
//! credit_limit = (collateral_principal + collateral_interest)
//!                * multiplier_bps / 10000                          (score >= threshold)
//! ```
//!
//! [`CreditProtocol`] is the external surface: it deploys and wires the aggregates and
//! forwards each call with the caller's identity.

pub mod line;
pub mod manager;
pub mod protocol;

pub use line::CreditLine;
pub use manager::{CreditInfo, CreditManager, CreditParameters, Liquidation, RepaymentReceipt};
pub use protocol::{Component, CreditProtocol, Deployment};
