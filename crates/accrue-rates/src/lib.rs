//! # Accrue Rates
//!
//! Utilization-driven interest-rate model.
//!
//! ## Rate Curve
//!
//! ```text
//! u <  optimal                    base -> max      (linear)
//! optimal <= u < penalty_util     max  -> penalty  (linear)
//! u >= penalty_util               penalty          (flat)
//! ```

pub mod model;

pub use model::{InterestRateModel, RateParameters};
