//! Proportional interest distribution
//!
//! Every repayment's lender share is split across all lenders *and* collateral
//! depositors in a single pass:
//!
//! ```text
//! share(d) = floor(principal(d) * interest / (total_deposited + total_collateral))
//! ```
//!
//! Truncation means `sum(shares) <= interest`; the remainder (at most one unit per
//! participant) stays in the pool reserve for good.
//!
//! ## Scaling
//!
//! The scan is O(lenders + collateral depositors) per repayment and is the dominant
//! cost of the whole system as participation grows. The replacement is a global
//! interest-per-share index bumped in O(1) per repayment, with each depositor's share
//! settled lazily on read. Until that lands, keep depositor counts bounded.

use accrue_common::math::mul_div_floor;
use accrue_common::{AccrueError, Address, Result};

use crate::book::{DepositBook, Namespace};

/// Shares computed for one distribution, not yet applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionPlan {
    pub shares: Vec<(Namespace, Address, u64)>,
    pub distributed: u64,
    /// Rounding remainder retained by the pool
    pub dust: u64,
}

/// Compute every participant's share of `amount` without mutating anything
pub fn plan_distribution(
    lenders: &DepositBook,
    collateral: &DepositBook,
    amount: u64,
) -> Result<DistributionPlan> {
    let total_shares = lenders
        .total_principal()
        .checked_add(collateral.total_principal())
        .ok_or(AccrueError::Overflow)?;

    if amount == 0 || total_shares == 0 {
        return Ok(DistributionPlan {
            dust: amount,
            ..DistributionPlan::default()
        });
    }

    let mut shares = Vec::with_capacity(lenders.len() + collateral.len());
    let mut distributed: u64 = 0;

    let books = [(Namespace::Lender, lenders), (Namespace::Collateral, collateral)];
    for (namespace, book) in books {
        for (who, record) in book.iter() {
            if record.principal == 0 {
                continue;
            }
            let share =
                mul_div_floor(record.principal, amount, total_shares).ok_or(AccrueError::Overflow)?;
            if share == 0 {
                continue;
            }
            record
                .earned_interest
                .checked_add(share)
                .ok_or(AccrueError::Overflow)?;
            distributed = distributed.checked_add(share).ok_or(AccrueError::Overflow)?;
            shares.push((namespace, *who, share));
        }
    }

    lenders
        .total_earned()
        .checked_add(collateral.total_earned())
        .and_then(|t| t.checked_add(distributed))
        .ok_or(AccrueError::Overflow)?;

    Ok(DistributionPlan {
        shares,
        distributed,
        dust: amount - distributed,
    })
}

/// Credit a validated plan to the books
pub fn apply_distribution(
    plan: &DistributionPlan,
    lenders: &mut DepositBook,
    collateral: &mut DepositBook,
) {
    for (namespace, who, share) in &plan.shares {
        match namespace {
            Namespace::Lender => lenders.credit(who, *share),
            Namespace::Collateral => collateral.credit(who, *share),
        }
    }
}
