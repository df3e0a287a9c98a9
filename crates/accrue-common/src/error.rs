//! Error types for the Accrue protocol core
//!
//! Every failure is synchronous and aborts the whole operation with no partial effect.

use thiserror::Error;

use crate::token::TokenError;

/// Result type alias using AccrueError
pub type Result<T> = std::result::Result<T, AccrueError>;

/// Which bound an `ExceedsLimit` failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Borrowed + interest + requested would exceed the dynamic credit limit
    CreditLimit,
    /// Principal repayment larger than the outstanding borrowed amount
    BorrowedAmount,
    /// Interest repayment larger than the accrued interest
    InterestAmount,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::CreditLimit => write!(f, "credit limit"),
            LimitKind::BorrowedAmount => write!(f, "borrowed amount"),
            LimitKind::InterestAmount => write!(f, "accrued interest"),
        }
    }
}

/// Error taxonomy, independent of payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotAuthorized,
    InvalidAmount,
    InsufficientBalance,
    InsufficientLiquidity,
    AlreadyExists,
    NotFound,
    ExceedsLimit,
    InvalidState,
    InvalidParameters,
    Internal,
}

/// Unified error type for Accrue operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccrueError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Insufficient liquidity: required {required}, available {available}")]
    InsufficientLiquidity { required: u64, available: u64 },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Exceeds {kind}: requested {requested}, limit {limit}")]
    ExceedsLimit {
        kind: LimitKind,
        requested: u64,
        limit: u64,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AccrueError {
    /// Project this error onto the protocol taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccrueError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            AccrueError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            AccrueError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            AccrueError::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
            AccrueError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AccrueError::NotFound(_) => ErrorKind::NotFound,
            AccrueError::ExceedsLimit { .. } => ErrorKind::ExceedsLimit,
            AccrueError::InvalidState(_) => ErrorKind::InvalidState,
            AccrueError::InvalidParameters(_) => ErrorKind::InvalidParameters,
            AccrueError::Token(TokenError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            AccrueError::Token(TokenError::InvalidAmount) => ErrorKind::InvalidAmount,
            AccrueError::Token(TokenError::Overflow) | AccrueError::Overflow => {
                ErrorKind::Internal
            }
            AccrueError::Config(_) => ErrorKind::InvalidParameters,
        }
    }

    pub fn not_authorized(msg: impl Into<String>) -> Self {
        AccrueError::NotAuthorized(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        AccrueError::InvalidAmount(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AccrueError::InvalidState(msg.into())
    }
}

impl From<config::ConfigError> for AccrueError {
    fn from(err: config::ConfigError) -> Self {
        AccrueError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccrueError::ExceedsLimit {
            kind: LimitKind::CreditLimit,
            requested: 11,
            limit: 10,
        };
        assert!(err.to_string().contains("credit limit"));
        assert!(err.to_string().contains("11"));
    }

    #[test]
    fn test_token_error_kind() {
        let err: AccrueError = TokenError::InsufficientBalance {
            required: 5,
            available: 1,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_liquidity_error() {
        let err = AccrueError::InsufficientLiquidity {
            required: 100,
            available: 40,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientLiquidity);
        assert!(err.to_string().contains("100"));
    }
}
