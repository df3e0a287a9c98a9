//! Unit conversions for display
//!
//! The ledger itself only ever stores integers in the token's smallest unit and
//! rates in basis points. These helpers render them as decimals for logs and views.

use rust_decimal::Decimal;

/// 100% in basis points
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default token precision (6-decimal fungible asset)
pub const DEFAULT_TOKEN_DECIMALS: u32 = 6;

/// Convert a raw token amount to whole units, e.g. `1_500_000` -> `1.5` at 6 decimals
pub fn to_token_units(amount: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, decimals)
}

/// Convert whole units back to the smallest unit, truncating extra precision
pub fn from_token_units(units: Decimal, decimals: u32) -> Option<u64> {
    if units.is_sign_negative() {
        return None;
    }
    let scaled = units.checked_mul(Decimal::from(10u64.checked_pow(decimals)?))?;
    u64::try_from(scaled.trunc()).ok()
}

/// Render basis points as a percentage, e.g. `550` -> `5.50`
pub fn bps_to_percent(bps: u64) -> Decimal {
    Decimal::from_i128_with_scale(bps as i128, 2)
}
