//! Core data types shared by every Accrue component

pub mod address;
pub mod units;

/// Seconds since the Unix epoch
pub type Timestamp = u64;
