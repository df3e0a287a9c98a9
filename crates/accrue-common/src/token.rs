//! Value store - the token-transfer capability the ledger runs on
//!
//! The pool never holds value itself; it owns an account inside a `ValueStore` and
//! moves value in and out of it. Key characteristics:
//! - Balances are plain `u64` amounts in the token's smallest unit
//! - Transfers are all-or-nothing
//! - `InMemoryToken` is the single concrete adapter

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::trace;

use crate::types::address::Address;

/// Value store errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    #[error("Insufficient token balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Token balance overflow")]
    Overflow,
}

/// Deposit/withdraw/balance capability over named accounts
pub trait ValueStore: Send + Sync {
    /// Current balance held by `account`
    fn balance_of(&self, account: &Address) -> u64;

    /// Move `amount` from `from` to `to`, atomically
    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError>;
}

/// Shared handle to a value store
pub type SharedValueStore = Arc<dyn ValueStore>;

/// In-memory fungible token ledger
#[derive(Debug, Default)]
pub struct InMemoryToken {
    symbol: String,
    decimals: u32,
    balances: RwLock<HashMap<Address, u64>>,
}

impl InMemoryToken {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            balances: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(symbol: impl Into<String>, decimals: u32) -> Arc<Self> {
        Arc::new(Self::new(symbol, decimals))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Create new supply in `account`
    pub fn mint(&self, account: &Address, amount: u64) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        let mut balances = self.balances.write();
        let balance = balances.entry(*account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> u128 {
        self.balances.read().values().map(|b| *b as u128).sum()
    }
}

impl ValueStore for InMemoryToken {
    fn balance_of(&self, account: &Address) -> u64 {
        self.balances.read().get(account).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let mut balances = self.balances.write();
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        let recipient = balances.get(to).copied().unwrap_or(0);
        let credited = recipient.checked_add(amount).ok_or(TokenError::Overflow)?;

        balances.insert(*from, available - amount);
        balances.insert(*to, credited);
        trace!(symbol = %self.symbol, from = %from.short(), to = %to.short(), amount, "transfer");
        Ok(())
    }
}
