//! LendingPool aggregate
//!
//! Holds all posted value in one value-store account and tracks who is owed what.
//! Every operation validates completely (including token balances) before touching
//! a single field, so a failed call leaves no trace.
//!
//! Pausing blocks value entering the pool (deposits, collateral, borrows). Exits
//! (withdrawals, claims, repayments, liquidation) stay open.

use accrue_common::math::{apply_bps, mul_div_floor};
use accrue_common::types::units::BPS_DENOMINATOR;
use accrue_common::{
    AccrueError, AdminControl, Address, PoolSettings, Result, SharedClock, SharedValueStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::book::{DepositBook, DepositRecord};
use crate::distribution::{apply_distribution, plan_distribution, DistributionPlan};

/// Pool-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_deposited: u64,
    pub total_collateral: u64,
    pub total_borrowed: u64,
    /// Principal repaid, including principal covered by seized collateral
    pub total_repaid: u64,
    /// Fee balance not yet withdrawn by the admin
    pub protocol_fees_collected: u64,
    pub total_fees_earned: u64,
    pub total_interest_distributed: u64,
    /// Principal written off when seized collateral could not cover it
    pub total_bad_debt: u64,
    /// Interest credited to depositors and not yet paid out
    pub unclaimed_interest: u64,
    pub lender_count: usize,
    pub collateral_depositor_count: usize,
}

impl PoolStats {
    /// Borrowed principal still owed to the pool
    pub fn outstanding_borrowed(&self) -> u64 {
        self.total_borrowed
            .saturating_sub(self.total_repaid)
            .saturating_sub(self.total_bad_debt)
    }
}

/// How one repayment's value was split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentSplit {
    pub principal: u64,
    pub protocol_fee: u64,
    pub lender_interest: u64,
    pub distributed: u64,
    /// Rounding remainder retained by the pool
    pub dust: u64,
}

/// Outcome of seizing a borrower's collateral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seizure {
    pub seized: u64,
    pub principal_covered: u64,
    pub interest_covered: u64,
    pub bad_debt: u64,
    pub split: RepaymentSplit,
}

/// Serializable view of the whole ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub admin: Address,
    pub credit_manager: Option<Address>,
    pub paused: bool,
    pub store_balance: u64,
    pub stats: PoolStats,
    pub lenders: Vec<(Address, DepositRecord)>,
    pub collateral: Vec<(Address, DepositRecord)>,
}

impl PoolSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AccrueError::Config(e.to_string()))
    }
}

pub struct LendingPool {
    /// Value-store account holding the pool's funds
    address: Address,
    control: AdminControl,
    credit_manager: Option<Address>,
    settings: PoolSettings,
    token: SharedValueStore,
    clock: SharedClock,
    lenders: DepositBook,
    collateral: DepositBook,
    total_borrowed: u64,
    total_repaid: u64,
    protocol_fees_collected: u64,
    total_fees_earned: u64,
    total_interest_distributed: u64,
    total_bad_debt: u64,
}

impl LendingPool {
    pub fn new(
        address: Address,
        admin: Address,
        settings: PoolSettings,
        token: SharedValueStore,
        clock: SharedClock,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            address,
            control: AdminControl::new(admin),
            credit_manager: None,
            settings,
            token,
            clock,
            lenders: DepositBook::new(),
            collateral: DepositBook::new(),
            total_borrowed: 0,
            total_repaid: 0,
            protocol_fees_collected: 0,
            total_fees_earned: 0,
            total_interest_distributed: 0,
            total_bad_debt: 0,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn control(&self) -> &AdminControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut AdminControl {
        &mut self.control
    }

    pub fn credit_manager(&self) -> Option<Address> {
        self.credit_manager
    }

    /// Register the credit manager allowed to call the privileged entry points
    pub fn set_credit_manager(&mut self, caller: &Address, manager: Address) -> Result<()> {
        self.control.ensure_admin(caller)?;
        if manager.is_zero() {
            return Err(AccrueError::InvalidParameters(
                "credit manager must be non-zero".into(),
            ));
        }
        self.credit_manager = Some(manager);
        info!(pool = %self.address.short(), manager = %manager.short(), "credit manager set");
        Ok(())
    }

    fn ensure_credit_manager(&self, caller: &Address) -> Result<()> {
        match self.credit_manager {
            Some(manager) if manager == *caller => Ok(()),
            _ => Err(AccrueError::not_authorized(format!(
                "{} is not the pool's credit manager",
                caller.short()
            ))),
        }
    }

    fn ensure_balance(&self, account: &Address, required: u64) -> Result<()> {
        let available = self.token.balance_of(account);
        if available < required {
            return Err(AccrueError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    fn ensure_liquidity(&self, required: u64) -> Result<()> {
        let available = self.get_available_liquidity();
        if available < required {
            return Err(AccrueError::InsufficientLiquidity {
                required,
                available,
            });
        }
        Ok(())
    }

    fn pay_out(&self, to: &Address, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.token.transfer(&self.address, to, amount)?;
        Ok(())
    }

    // ============ LENDERS ============

    #[instrument(skip(self), fields(pool = %self.address.short()))]
    pub fn deposit(&mut self, lender: &Address, amount: u64) -> Result<()> {
        self.control.ensure_not_paused()?;
        if amount == 0 || amount < self.settings.min_deposit {
            return Err(AccrueError::invalid_amount(format!(
                "deposit {} below minimum {}",
                amount, self.settings.min_deposit
            )));
        }
        self.lenders.check_deposit(lender, amount)?;
        self.ensure_balance(lender, amount)?;

        self.token.transfer(lender, &self.address, amount)?;
        let now = self.clock.now();
        self.lenders.add_principal(*lender, amount, now)?;

        info!(
            lender = %lender.short(),
            amount,
            total_deposited = self.lenders.total_principal(),
            "deposit"
        );
        Ok(())
    }

    /// Withdraw principal; emptying the position also pays out earned interest
    ///
    /// Liquidity is checked against the principal alone. Interest the pool cannot cover
    /// right now stays on the record for a later `claim_interest`.
    #[instrument(skip(self), fields(pool = %self.address.short()))]
    pub fn withdraw(&mut self, lender: &Address, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(AccrueError::invalid_amount("withdraw amount must be positive"));
        }
        let (principal, earned) = self.get_lender_info(lender);

        self.ensure_liquidity(amount)?;
        if principal < amount {
            return Err(AccrueError::InsufficientBalance {
                required: amount,
                available: principal,
            });
        }
        let interest = if amount == principal {
            earned.min(self.get_available_liquidity().saturating_sub(amount))
        } else {
            0
        };
        let payout = amount.checked_add(interest).ok_or(AccrueError::Overflow)?;

        let now = self.clock.now();
        self.lenders.take(lender, amount, interest, 0, now)?;
        self.pay_out(lender, payout)?;

        info!(lender = %lender.short(), amount, interest, "withdraw");
        Ok(payout)
    }

    /// Pay out a lender's earned interest, leaving principal untouched
    #[instrument(skip(self), fields(pool = %self.address.short()))]
    pub fn claim_interest(&mut self, lender: &Address) -> Result<u64> {
        let earned = self.lenders.earned_of(lender);
        if earned == 0 {
            return Err(AccrueError::invalid_amount("no interest to claim"));
        }
        self.ensure_liquidity(earned)?;

        let now = self.clock.now();
        self.lenders.take(lender, 0, earned, 0, now)?;
        self.pay_out(lender, earned)?;

        info!(lender = %lender.short(), earned, "interest claimed");
        Ok(earned)
    }

    // ============ COLLATERAL (credit manager only) ============

    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn deposit_collateral(
        &mut self,
        caller: &Address,
        borrower: &Address,
        amount: u64,
    ) -> Result<()> {
        self.ensure_credit_manager(caller)?;
        self.control.ensure_not_paused()?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("collateral must be positive"));
        }
        self.collateral.check_deposit(borrower, amount)?;
        self.ensure_balance(borrower, amount)?;

        self.token.transfer(borrower, &self.address, amount)?;
        let now = self.clock.now();
        self.collateral.add_principal(*borrower, amount, now)?;

        info!(
            borrower = %borrower.short(),
            amount,
            total_collateral = self.collateral.total_principal(),
            "collateral deposited"
        );
        Ok(())
    }

    /// Release collateral to the borrower
    ///
    /// With `include_interest` the payout may dig into earned interest once principal
    /// is exhausted. Without it only principal is released and the withdrawn fraction
    /// of earned interest is forfeited to the pool reserve. Partial withdrawals give up
    /// unrealized interest on the withdrawn part; this is deliberate policy.
    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn withdraw_collateral(
        &mut self,
        caller: &Address,
        borrower: &Address,
        amount: u64,
        include_interest: bool,
    ) -> Result<u64> {
        self.ensure_credit_manager(caller)?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("withdraw amount must be positive"));
        }
        let (principal, earned, total) = self.get_collateral_with_interest(borrower);

        let (from_principal, from_interest, forfeit) = if include_interest {
            if amount > total {
                return Err(AccrueError::InsufficientBalance {
                    required: amount,
                    available: total,
                });
            }
            let from_principal = amount.min(principal);
            (from_principal, amount - from_principal, 0)
        } else {
            if amount > principal {
                return Err(AccrueError::InsufficientBalance {
                    required: amount,
                    available: principal,
                });
            }
            let forfeit = mul_div_floor(earned, amount, principal).ok_or(AccrueError::Overflow)?;
            (amount, 0, forfeit)
        };
        self.ensure_liquidity(amount)?;

        let now = self.clock.now();
        self.collateral
            .take(borrower, from_principal, from_interest, forfeit, now)?;
        self.pay_out(borrower, amount)?;

        info!(
            borrower = %borrower.short(),
            amount,
            from_interest,
            forfeit,
            "collateral withdrawn"
        );
        Ok(amount)
    }

    /// `(principal, earned_interest, principal + earned_interest)`
    pub fn get_collateral_with_interest(&self, borrower: &Address) -> (u64, u64, u64) {
        match self.collateral.get(borrower) {
            Some(record) => (record.principal, record.earned_interest, record.total()),
            None => (0, 0, 0),
        }
    }

    // ============ BORROW / REPAY (credit manager only) ============

    /// Lend `amount` straight to `recipient`, who may be a third party
    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn borrow_for_payment(
        &mut self,
        caller: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<u64> {
        self.ensure_credit_manager(caller)?;
        self.control.ensure_not_paused()?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("borrow amount must be positive"));
        }
        if recipient.is_zero() {
            return Err(AccrueError::invalid_amount("recipient must be non-zero"));
        }
        self.ensure_liquidity(amount)?;
        let total_borrowed = self
            .total_borrowed
            .checked_add(amount)
            .ok_or(AccrueError::Overflow)?;

        self.pay_out(recipient, amount)?;
        self.total_borrowed = total_borrowed;

        info!(
            recipient = %recipient.short(),
            amount,
            outstanding = self.outstanding_borrowed(),
            "borrowed"
        );
        Ok(amount)
    }

    /// Take a repayment of `principal + interest` from `payer`
    ///
    /// Interest is split into the protocol fee and the depositor share, and the depositor
    /// share is distributed across every lender and collateral depositor.
    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn receive_repayment(
        &mut self,
        caller: &Address,
        borrower: &Address,
        principal: u64,
        interest: u64,
        payer: &Address,
    ) -> Result<RepaymentSplit> {
        self.ensure_credit_manager(caller)?;
        let amount = principal
            .checked_add(interest)
            .ok_or(AccrueError::Overflow)?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("repayment must be positive"));
        }
        let outstanding = self.outstanding_borrowed();
        if principal > outstanding {
            return Err(AccrueError::invalid_state(format!(
                "principal {} exceeds pool outstanding {}",
                principal, outstanding
            )));
        }

        let (split, plan) = self.plan_interest(&self.collateral, principal, interest)?;
        let total_repaid = self
            .total_repaid
            .checked_add(principal)
            .ok_or(AccrueError::Overflow)?;
        self.ensure_balance(payer, amount)?;

        self.token.transfer(payer, &self.address, amount)?;
        self.total_repaid = total_repaid;
        self.apply_interest(&split, &plan);

        info!(
            borrower = %borrower.short(),
            principal,
            interest,
            fee = split.protocol_fee,
            distributed = split.distributed,
            participants = plan.shares.len(),
            "repayment received"
        );
        Ok(split)
    }

    /// Seize up to `amount` of a borrower's collateral to cover `principal_due`
    ///
    /// No value leaves the pool: the seized collateral stops being owed to the borrower
    /// and instead covers the borrowed principal that already left. Principal is consumed
    /// before earned interest. Seized value beyond `principal_due` is booked as interest;
    /// principal it cannot cover is written off as bad debt.
    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn seize_collateral(
        &mut self,
        caller: &Address,
        borrower: &Address,
        amount: u64,
        principal_due: u64,
    ) -> Result<Seizure> {
        self.ensure_credit_manager(caller)?;
        let (principal, _, total) = self.get_collateral_with_interest(borrower);
        if amount > total {
            return Err(AccrueError::InsufficientBalance {
                required: amount,
                available: total,
            });
        }
        let outstanding = self.outstanding_borrowed();
        if principal_due > outstanding {
            return Err(AccrueError::invalid_state(format!(
                "principal {} exceeds pool outstanding {}",
                principal_due, outstanding
            )));
        }

        let from_principal = amount.min(principal);
        let from_interest = amount - from_principal;
        let principal_covered = amount.min(principal_due);
        let interest_covered = amount - principal_covered;
        let bad_debt = principal_due - principal_covered;

        // plan against the post-seizure book before touching the real one
        let now = self.clock.now();
        let mut collateral = self.collateral.clone();
        if amount > 0 {
            collateral.take(borrower, from_principal, from_interest, 0, now)?;
        }
        let (split, plan) = self.plan_interest(&collateral, principal_covered, interest_covered)?;
        let total_repaid = self
            .total_repaid
            .checked_add(principal_covered)
            .ok_or(AccrueError::Overflow)?;
        let total_bad_debt = self
            .total_bad_debt
            .checked_add(bad_debt)
            .ok_or(AccrueError::Overflow)?;

        self.collateral = collateral;
        self.total_repaid = total_repaid;
        self.total_bad_debt = total_bad_debt;
        self.apply_interest(&split, &plan);

        if bad_debt > 0 {
            warn!(borrower = %borrower.short(), bad_debt, "collateral short of debt, written off");
        }
        info!(
            borrower = %borrower.short(),
            seized = amount,
            principal_covered,
            interest_covered,
            "collateral seized"
        );
        Ok(Seizure {
            seized: amount,
            principal_covered,
            interest_covered,
            bad_debt,
            split,
        })
    }

    fn plan_interest(
        &self,
        collateral: &DepositBook,
        principal: u64,
        interest: u64,
    ) -> Result<(RepaymentSplit, DistributionPlan)> {
        let protocol_fee = apply_bps(interest, self.settings.fee_rate_bps)?;
        let lender_interest = interest - protocol_fee;
        self.protocol_fees_collected
            .checked_add(protocol_fee)
            .ok_or(AccrueError::Overflow)?;
        let plan = plan_distribution(&self.lenders, collateral, lender_interest)?;
        let split = RepaymentSplit {
            principal,
            protocol_fee,
            lender_interest,
            distributed: plan.distributed,
            dust: plan.dust,
        };
        Ok((split, plan))
    }

    fn apply_interest(&mut self, split: &RepaymentSplit, plan: &DistributionPlan) {
        apply_distribution(plan, &mut self.lenders, &mut self.collateral);
        self.protocol_fees_collected += split.protocol_fee;
        self.total_fees_earned = self.total_fees_earned.saturating_add(split.protocol_fee);
        self.total_interest_distributed = self
            .total_interest_distributed
            .saturating_add(split.distributed);
        debug!(dust = split.dust, "interest distributed");
    }

    // ============ ADMIN ============

    /// Move collected protocol fees out of the pool
    #[instrument(skip(self, caller), fields(pool = %self.address.short()))]
    pub fn withdraw_fees(&mut self, caller: &Address, to: &Address, amount: u64) -> Result<()> {
        self.control.ensure_admin(caller)?;
        if amount == 0 || amount > self.protocol_fees_collected {
            return Err(AccrueError::invalid_amount(format!(
                "fee withdrawal {} outside (0, {}]",
                amount, self.protocol_fees_collected
            )));
        }
        if to.is_zero() {
            return Err(AccrueError::invalid_amount("recipient must be non-zero"));
        }
        self.ensure_balance(&self.address, amount)?;

        self.pay_out(to, amount)?;
        self.protocol_fees_collected -= amount;
        info!(to = %to.short(), amount, "protocol fees withdrawn");
        Ok(())
    }

    // ============ VIEWS ============

    pub fn store_balance(&self) -> u64 {
        self.token.balance_of(&self.address)
    }

    /// Store balance net of protocol fees
    pub fn get_available_liquidity(&self) -> u64 {
        self.store_balance()
            .saturating_sub(self.protocol_fees_collected)
    }

    pub fn outstanding_borrowed(&self) -> u64 {
        self.total_borrowed
            .saturating_sub(self.total_repaid)
            .saturating_sub(self.total_bad_debt)
    }

    /// Outstanding borrows over lender deposits, in bps; zero without deposits
    pub fn get_utilization_rate(&self) -> u64 {
        let deposited = self.lenders.total_principal();
        if deposited == 0 {
            return 0;
        }
        mul_div_floor(self.outstanding_borrowed(), BPS_DENOMINATOR, deposited).unwrap_or(u64::MAX)
    }

    /// `(principal, earned_interest)`
    pub fn get_lender_info(&self, lender: &Address) -> (u64, u64) {
        match self.lenders.get(lender) {
            Some(record) => (record.principal, record.earned_interest),
            None => (0, 0),
        }
    }

    pub fn lender_record(&self, lender: &Address) -> Option<&DepositRecord> {
        self.lenders.get(lender)
    }

    pub fn collateral_record(&self, borrower: &Address) -> Option<&DepositRecord> {
        self.collateral.get(borrower)
    }

    pub fn lenders(&self) -> &DepositBook {
        &self.lenders
    }

    pub fn collateral(&self) -> &DepositBook {
        &self.collateral
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        PoolStats {
            total_deposited: self.lenders.total_principal(),
            total_collateral: self.collateral.total_principal(),
            total_borrowed: self.total_borrowed,
            total_repaid: self.total_repaid,
            protocol_fees_collected: self.protocol_fees_collected,
            total_fees_earned: self.total_fees_earned,
            total_interest_distributed: self.total_interest_distributed,
            total_bad_debt: self.total_bad_debt,
            unclaimed_interest: self.lenders.total_earned() + self.collateral.total_earned(),
            lender_count: self.lenders.len(),
            collateral_depositor_count: self.collateral.len(),
        }
    }

    /// Liabilities the pool must be able to honour
    ///
    /// `store_balance + bad_debt >= deposits + collateral + unclaimed interest + fees
    /// - outstanding borrows` holds after every operation; bad debt is the only way the
    /// pool can hold less than it promised.
    pub fn is_solvent(&self) -> bool {
        let stats = self.get_pool_stats();
        let liabilities = stats.total_deposited as u128
            + stats.total_collateral as u128
            + stats.unclaimed_interest as u128
            + stats.protocol_fees_collected as u128;
        let assets = self.store_balance() as u128
            + stats.outstanding_borrowed() as u128
            + stats.total_bad_debt as u128;
        assets >= liabilities
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            address: self.address,
            admin: self.control.admin(),
            credit_manager: self.credit_manager,
            paused: self.control.is_paused(),
            store_balance: self.store_balance(),
            stats: self.get_pool_stats(),
            lenders: self.lenders.iter().map(|(a, r)| (*a, *r)).collect(),
            collateral: self.collateral.iter().map(|(a, r)| (*a, *r)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_common::{ErrorKind, InMemoryToken, ManualClock, ValueStore};
    use std::sync::Arc;

    struct Fixture {
        pool: LendingPool,
        token: Arc<InMemoryToken>,
        admin: Address,
        manager: Address,
    }

    fn fixture() -> Fixture {
        let token = InMemoryToken::shared("USDC", 6);
        let admin = Address::derive("admin");
        let manager = Address::derive("credit-manager");
        let settings = PoolSettings {
            min_deposit: 1,
            fee_rate_bps: 1_000,
        };
        let mut pool = LendingPool::new(
            Address::derive("pool"),
            admin,
            settings,
            token.clone(),
            ManualClock::shared(1_000),
        )
        .unwrap();
        pool.set_credit_manager(&admin, manager).unwrap();
        Fixture {
            pool,
            token,
            admin,
            manager,
        }
    }

    fn funded(token: &InMemoryToken, label: &str, amount: u64) -> Address {
        let who = Address::derive(label);
        token.mint(&who, amount).unwrap();
        who
    }

    #[test]
    fn test_deposit_and_withdraw_round_trip() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 500);

        f.pool.deposit(&lender, 200).unwrap();
        assert_eq!(f.pool.get_lender_info(&lender), (200, 0));
        assert_eq!(f.pool.store_balance(), 200);

        f.pool.withdraw(&lender, 200).unwrap();
        assert!(f.pool.lender_record(&lender).is_none());
        assert_eq!(f.token.balance_of(&lender), 500);
        assert_eq!(f.pool.get_pool_stats().total_deposited, 0);
    }

    #[test]
    fn test_deposit_below_minimum() {
        let mut f = fixture();
        f.pool.settings.min_deposit = 100;
        let lender = funded(&f.token, "lender", 500);

        let err = f.pool.deposit(&lender, 99).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(f.pool.deposit(&lender, 0).unwrap_err().kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_deposit_without_funds_leaves_no_trace() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 10);

        let err = f.pool.deposit(&lender, 50).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(f.pool.lender_record(&lender).is_none());
        assert_eq!(f.token.balance_of(&lender), 10);
    }

    #[test]
    fn test_paused_pool_rejects_deposits() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 100);
        f.pool.deposit(&lender, 50).unwrap();
        let admin = f.admin;
        f.pool.control_mut().pause(&admin).unwrap();

        let err = f.pool.deposit(&lender, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        // exits stay open
        f.pool.withdraw(&lender, 50).unwrap();
    }

    #[test]
    fn test_withdraw_more_than_principal() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 100);
        let other = funded(&f.token, "other", 100);
        f.pool.deposit(&lender, 50).unwrap();
        f.pool.deposit(&other, 100).unwrap();

        let err = f.pool.withdraw(&lender, 60).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_withdraw_blocked_by_liquidity() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 100);
        let shop = Address::derive("shop");
        f.pool.deposit(&lender, 100).unwrap();
        let manager = f.manager;
        f.pool.borrow_for_payment(&manager, &shop, 80).unwrap();

        let err = f.pool.withdraw(&lender, 50).unwrap_err();
        assert!(matches!(
            err,
            AccrueError::InsufficientLiquidity {
                required: 50,
                available: 20
            }
        ));
        assert_eq!(f.pool.get_utilization_rate(), 8_000);
    }

    #[test]
    fn test_full_withdrawal_when_interest_exceeds_liquidity() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 100);
        let borrower = funded(&f.token, "borrower", 100);
        let payer = funded(&f.token, "payer", 20);
        let shop = Address::derive("shop");
        f.pool.deposit(&lender, 100).unwrap();
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &borrower, 0, 20, &payer)
            .unwrap();
        f.pool.borrow_for_payment(&manager, &shop, 118).unwrap();
        assert_eq!(f.pool.get_lender_info(&lender), (100, 9));
        assert_eq!(f.pool.get_available_liquidity(), 100);

        // principal goes out, interest waits for liquidity
        assert_eq!(f.pool.withdraw(&lender, 100).unwrap(), 100);
        assert_eq!(f.pool.get_lender_info(&lender), (0, 9));
        assert_eq!(f.token.balance_of(&lender), 100);
        assert!(f.pool.is_solvent());

        let err = f.pool.claim_interest(&lender).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientLiquidity);
        f.pool
            .receive_repayment(&manager, &borrower, 18, 0, &shop)
            .unwrap();
        assert_eq!(f.pool.claim_interest(&lender).unwrap(), 9);
        assert!(f.pool.lender_record(&lender).is_none());
    }

    #[test]
    fn test_full_withdrawal_pays_interest_liquidity_allows() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 100);
        let borrower = funded(&f.token, "borrower", 100);
        let payer = funded(&f.token, "payer", 20);
        f.pool.deposit(&lender, 100).unwrap();
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &borrower, 0, 20, &payer)
            .unwrap();
        f.pool
            .borrow_for_payment(&manager, &Address::derive("shop"), 114)
            .unwrap();

        assert_eq!(f.pool.withdraw(&lender, 100).unwrap(), 104);
        assert_eq!(f.pool.get_lender_info(&lender), (0, 5));
    }

    #[test]
    fn test_privileged_entry_points_require_manager() {
        let mut f = fixture();
        let borrower = funded(&f.token, "borrower", 100);

        let err = f
            .pool
            .deposit_collateral(&borrower, &borrower, 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        let err = f
            .pool
            .borrow_for_payment(&borrower, &borrower, 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn test_repayment_fee_and_distribution() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender-a", 100);
        let borrower = funded(&f.token, "borrower-b", 100);
        let payer = funded(&f.token, "payer", 20);

        f.pool.deposit(&lender, 100).unwrap();
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();

        let split = f
            .pool
            .receive_repayment(&manager, &borrower, 0, 20, &payer)
            .unwrap();
        assert_eq!(split.protocol_fee, 2);
        assert_eq!(split.lender_interest, 18);
        assert_eq!(split.distributed, 18);

        assert_eq!(f.pool.get_lender_info(&lender), (100, 9));
        assert_eq!(f.pool.get_collateral_with_interest(&borrower), (100, 9, 109));
        assert_eq!(f.pool.get_pool_stats().protocol_fees_collected, 2);
        assert!(f.pool.is_solvent());
    }

    #[test]
    fn test_repayment_reduces_outstanding() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 1_000);
        let borrower = Address::derive("borrower");
        f.pool.deposit(&lender, 1_000).unwrap();
        f.pool.borrow_for_payment(&manager, &borrower, 400).unwrap();

        f.pool
            .receive_repayment(&manager, &borrower, 150, 10, &borrower)
            .unwrap();
        assert_eq!(f.pool.outstanding_borrowed(), 250);
        assert_eq!(f.pool.get_utilization_rate(), 2_500);

        let err = f
            .pool
            .receive_repayment(&manager, &borrower, 300, 0, &borrower)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_failed_repayment_leaves_no_trace() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 1_000);
        let borrower = Address::derive("borrower");
        f.pool.deposit(&lender, 1_000).unwrap();
        f.pool.borrow_for_payment(&manager, &borrower, 400).unwrap();
        let broke = Address::derive("broke");

        let before = f.pool.get_pool_stats();
        let err = f
            .pool
            .receive_repayment(&manager, &borrower, 100, 50, &broke)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(f.pool.get_pool_stats(), before);
    }

    #[test]
    fn test_full_collateral_withdrawal_with_interest() {
        let mut f = fixture();
        let manager = f.manager;
        let borrower = funded(&f.token, "borrower", 100);
        let payer = funded(&f.token, "payer", 10);
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &borrower, 0, 10, &payer)
            .unwrap();
        assert_eq!(f.pool.get_collateral_with_interest(&borrower), (100, 9, 109));

        let err = f
            .pool
            .withdraw_collateral(&manager, &borrower, 110, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        f.pool
            .withdraw_collateral(&manager, &borrower, 109, true)
            .unwrap();
        assert!(f.pool.collateral_record(&borrower).is_none());
        assert_eq!(f.token.balance_of(&borrower), 109);
    }

    #[test]
    fn test_partial_collateral_withdrawal_forfeits_interest() {
        let mut f = fixture();
        let manager = f.manager;
        let borrower = funded(&f.token, "borrower", 100);
        let payer = funded(&f.token, "payer", 10);
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &borrower, 0, 10, &payer)
            .unwrap();

        // half the principal out, half the earned 9 (floor 4) forfeited
        f.pool
            .withdraw_collateral(&manager, &borrower, 50, false)
            .unwrap();
        assert_eq!(f.pool.get_collateral_with_interest(&borrower), (50, 5, 55));
        assert!(f.pool.is_solvent());
    }

    #[test]
    fn test_claim_interest() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 100);
        let payer = funded(&f.token, "payer", 10);
        f.pool.deposit(&lender, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &lender, 0, 10, &payer)
            .unwrap();

        assert_eq!(f.pool.claim_interest(&lender).unwrap(), 9);
        assert_eq!(f.pool.get_lender_info(&lender), (100, 0));
        assert_eq!(
            f.pool.claim_interest(&lender).unwrap_err().kind(),
            ErrorKind::InvalidAmount
        );
    }

    #[test]
    fn test_seize_collateral_with_bad_debt() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 1_000);
        let borrower = funded(&f.token, "borrower", 100);
        f.pool.deposit(&lender, 1_000).unwrap();
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool.borrow_for_payment(&manager, &borrower, 120).unwrap();

        let seizure = f
            .pool
            .seize_collateral(&manager, &borrower, 100, 120)
            .unwrap();
        assert_eq!(seizure.principal_covered, 100);
        assert_eq!(seizure.bad_debt, 20);
        assert_eq!(f.pool.outstanding_borrowed(), 0);
        assert!(f.pool.collateral_record(&borrower).is_none());
        assert!(f.pool.is_solvent());
    }

    #[test]
    fn test_failed_seizure_leaves_book_untouched() {
        let mut f = fixture();
        let manager = f.manager;
        let lender = funded(&f.token, "lender", 1_000);
        let borrower = funded(&f.token, "borrower", 100);
        f.pool.deposit(&lender, 1_000).unwrap();
        f.pool.deposit_collateral(&manager, &borrower, 100).unwrap();
        f.pool.borrow_for_payment(&manager, &borrower, 50).unwrap();
        f.pool.protocol_fees_collected = u64::MAX;

        // 10 of the seized 60 is interest, and its fee cannot be booked
        let err = f
            .pool
            .seize_collateral(&manager, &borrower, 60, 50)
            .unwrap_err();
        assert!(matches!(err, AccrueError::Overflow));
        assert_eq!(f.pool.get_collateral_with_interest(&borrower), (100, 0, 100));
        assert_eq!(f.pool.outstanding_borrowed(), 50);
        assert_eq!(f.pool.get_pool_stats().total_bad_debt, 0);
    }

    #[test]
    fn test_withdraw_fees() {
        let mut f = fixture();
        let manager = f.manager;
        let admin = f.admin;
        let lender = funded(&f.token, "lender", 100);
        let payer = funded(&f.token, "payer", 50);
        let treasury = Address::derive("treasury");
        f.pool.deposit(&lender, 100).unwrap();
        f.pool
            .receive_repayment(&manager, &lender, 0, 50, &payer)
            .unwrap();
        assert_eq!(f.pool.get_available_liquidity(), 145);

        assert!(f.pool.withdraw_fees(&manager, &treasury, 5).is_err());
        assert!(f.pool.withdraw_fees(&admin, &treasury, 6).is_err());
        f.pool.withdraw_fees(&admin, &treasury, 5).unwrap();
        assert_eq!(f.token.balance_of(&treasury), 5);
        assert_eq!(f.pool.get_pool_stats().protocol_fees_collected, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut f = fixture();
        let lender = funded(&f.token, "lender", 100);
        f.pool.deposit(&lender, 100).unwrap();

        let json = f.pool.snapshot().to_json().unwrap();
        assert!(json.contains("total_deposited"));
        assert!(json.contains(&lender.to_hex()));
    }
}
