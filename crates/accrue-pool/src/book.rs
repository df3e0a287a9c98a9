//! Deposit books
//!
//! Lenders and collateral depositors are modelled identically but tracked in separate
//! books, so pool-wide accounting can tell liquidity supply from posted collateral
//! while both earn the same interest.

use std::collections::BTreeMap;

use accrue_common::{AccrueError, Address, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// One depositor's position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub principal: u64,
    pub earned_interest: u64,
    pub last_touch: Timestamp,
}

impl DepositRecord {
    #[inline]
    pub fn total(&self) -> u64 {
        self.principal.saturating_add(self.earned_interest)
    }
}

/// Which book a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Lender,
    Collateral,
}

/// Address-ordered set of deposit records with running totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositBook {
    records: BTreeMap<Address, DepositRecord>,
    total_principal: u64,
    total_earned: u64,
}

impl DepositBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, who: &Address) -> Option<&DepositRecord> {
        self.records.get(who)
    }

    pub fn principal_of(&self, who: &Address) -> u64 {
        self.records.get(who).map(|r| r.principal).unwrap_or(0)
    }

    pub fn earned_of(&self, who: &Address) -> u64 {
        self.records.get(who).map(|r| r.earned_interest).unwrap_or(0)
    }

    pub fn total_principal(&self) -> u64 {
        self.total_principal
    }

    /// Interest credited but not yet paid out
    pub fn total_earned(&self) -> u64 {
        self.total_earned
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &DepositRecord)> {
        self.records.iter()
    }

    /// Fail `Overflow` if adding `amount` of principal would not fit
    pub fn check_deposit(&self, who: &Address, amount: u64) -> Result<()> {
        self.total_principal
            .checked_add(amount)
            .and(self.principal_of(who).checked_add(amount))
            .map(|_| ())
            .ok_or(AccrueError::Overflow)
    }

    /// Add principal, creating the record on first deposit
    pub fn add_principal(&mut self, who: Address, amount: u64, now: Timestamp) -> Result<()> {
        self.check_deposit(&who, amount)?;
        let record = self.records.entry(who).or_insert(DepositRecord {
            principal: 0,
            earned_interest: 0,
            last_touch: now,
        });
        record.principal += amount;
        record.last_touch = now;
        self.total_principal += amount;
        Ok(())
    }

    /// Take `principal` and `interest` out of a record
    ///
    /// `forfeit` is interest dropped back into the pool reserve rather than paid.
    /// The record is removed once both principal and earned interest are zero.
    pub fn take(
        &mut self,
        who: &Address,
        principal: u64,
        interest: u64,
        forfeit: u64,
        now: Timestamp,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(who)
            .ok_or_else(|| AccrueError::NotFound(format!("no deposit for {}", who.short())))?;

        let interest_out = interest.checked_add(forfeit).ok_or(AccrueError::Overflow)?;
        if record.principal < principal {
            return Err(AccrueError::InsufficientBalance {
                required: principal,
                available: record.principal,
            });
        }
        if record.earned_interest < interest_out {
            return Err(AccrueError::InsufficientBalance {
                required: interest_out,
                available: record.earned_interest,
            });
        }

        record.principal -= principal;
        record.earned_interest -= interest_out;
        record.last_touch = now;
        self.total_principal -= principal;
        self.total_earned -= interest_out;

        if record.principal == 0 && record.earned_interest == 0 {
            self.records.remove(who);
        }
        Ok(())
    }

    /// Credit earned interest to an existing record
    pub(crate) fn credit(&mut self, who: &Address, amount: u64) {
        if let Some(record) = self.records.get_mut(who) {
            record.earned_interest += amount;
            self.total_earned += amount;
        }
    }
}
