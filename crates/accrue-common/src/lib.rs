//! # Accrue Common
//!
//! Shared types, errors, and primitives for the Accrue credit protocol.
//!
//! ## Core Types
//!
//! - [`Address`]: 32-byte participant identity
//! - [`AccrueError`]: protocol error taxonomy
//! - [`ValueStore`]/[`InMemoryToken`]: the token-transfer capability the pool runs on
//! - [`TimeSource`]: wall-clock seconds for accrual math
//! - [`AdminControl`]: admin, two-step admin transfer and pause flag
//! - [`Registry`]: address-keyed aggregate store
//!
//! ## Math
//!
//! - [`math::accrue_interest`]: simple interest with 128-bit intermediates
//! - [`math::mul_div_floor`]: proportional shares with a single truncation

pub mod admin;
pub mod config;
pub mod error;
pub mod math;
pub mod registry;
pub mod telemetry;
pub mod time;
pub mod token;
pub mod types;

// Re-export commonly used types at crate root
pub use admin::AdminControl;
pub use config::{CreditSettings, PoolSettings, ProtocolConfig, RateSettings};
pub use error::{AccrueError, ErrorKind, LimitKind, Result};
pub use registry::{Registry, Shared};
pub use time::{ManualClock, SharedClock, SystemClock, TimeSource};
pub use token::{InMemoryToken, SharedValueStore, TokenError, ValueStore};
pub use types::{address::Address, Timestamp};

/// Accrue version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum reputation score value
pub const MAX_REPUTATION_SCORE: u16 = 1000;

/// Minimum reputation score value
pub const MIN_REPUTATION_SCORE: u16 = 0;
