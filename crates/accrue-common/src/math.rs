//! Fixed-point helpers and the interest-accrual primitive
//!
//! All products are taken in `u128` and divided last, so truncation happens exactly once.

use crate::error::{AccrueError, Result};
use crate::types::units::BPS_DENOMINATOR;

/// 365 days
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// `floor(a * b / c)`; `None` on division by zero or if the result does not fit `u64`
#[inline]
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    u64::try_from(a as u128 * b as u128 / c as u128).ok()
}

/// `floor(amount * bps / 10000)`
#[inline]
pub fn apply_bps(amount: u64, bps: u64) -> Result<u64> {
    mul_div_floor(amount, bps, BPS_DENOMINATOR).ok_or(AccrueError::Overflow)
}

/// Simple interest on `principal` at `annual_rate_bps` over `elapsed_secs`:
/// `floor(principal * rate * elapsed / (10000 * SECONDS_PER_YEAR))`
pub fn accrue_interest(principal: u64, annual_rate_bps: u64, elapsed_secs: u64) -> Result<u64> {
    if principal == 0 || annual_rate_bps == 0 || elapsed_secs == 0 {
        return Ok(0);
    }
    let numerator = (principal as u128)
        .checked_mul(annual_rate_bps as u128)
        .and_then(|n| n.checked_mul(elapsed_secs as u128))
        .ok_or(AccrueError::Overflow)?;
    let denominator = BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128;
    u64::try_from(numerator / denominator).map_err(|_| AccrueError::Overflow)
}

/// Loan-to-value in basis points; `None` when there is no collateral
pub fn ltv_bps(debt: u64, collateral: u64) -> Option<u64> {
    if collateral == 0 {
        return None;
    }
    let ltv = debt as u128 * BPS_DENOMINATOR as u128 / collateral as u128;
    Some(u64::try_from(ltv).unwrap_or(u64::MAX))
}

/// Linear interpolation `from + (to - from) * num / den`, for `from <= to`
pub fn lerp(from: u64, to: u64, num: u64, den: u64) -> u64 {
    if den == 0 || num >= den {
        return to;
    }
    let span = to.saturating_sub(from);
    from + mul_div_floor(span, num, den).unwrap_or(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_year_at_ten_percent() {
        let interest = accrue_interest(1_000_000, 1_000, SECONDS_PER_YEAR).unwrap();
        assert_eq!(interest, 100_000);
    }

    #[test]
    fn test_accrual_truncates() {
        // 100 * 500 * 1 / (10000 * 31536000) is far below one unit
        assert_eq!(accrue_interest(100, 500, 1).unwrap(), 0);
    }

    #[test]
    fn test_accrual_wide_intermediate() {
        // product exceeds u64 but the result fits
        let interest = accrue_interest(u64::MAX / 2, 10_000, SECONDS_PER_YEAR).unwrap();
        assert_eq!(interest, u64::MAX / 2);
    }

    #[test]
    fn test_accrual_overflow() {
        let result = accrue_interest(u64::MAX, 10_000, SECONDS_PER_YEAR * 2);
        assert_eq!(result, Err(AccrueError::Overflow));
    }

    #[test]
    fn test_ltv() {
        assert_eq!(ltv_bps(5, 10), Some(5_000));
        assert_eq!(ltv_bps(11, 10), Some(11_000));
        assert_eq!(ltv_bps(1, 0), None);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(200, 1_000, 0, 8_000), 200);
        assert_eq!(lerp(200, 1_000, 4_000, 8_000), 600);
        assert_eq!(lerp(200, 1_000, 8_000, 8_000), 1_000);
        assert_eq!(lerp(200, 1_000, 1, 0), 1_000);
    }

    proptest! {
        #[test]
        fn prop_accrual_monotone_in_time(
            principal in 0u64..1_000_000_000_000,
            rate in 0u64..50_000,
            t1 in 0u64..SECONDS_PER_YEAR * 10,
            dt in 0u64..SECONDS_PER_YEAR,
        ) {
            let a = accrue_interest(principal, rate, t1).unwrap();
            let b = accrue_interest(principal, rate, t1 + dt).unwrap();
            prop_assert!(a <= b);
        }

        #[test]
        fn prop_apply_bps_never_exceeds_amount(amount in any::<u64>(), bps in 0u64..=10_000) {
            prop_assert!(apply_bps(amount, bps).unwrap() <= amount);
        }
    }
}
