//! CreditManager - borrower credit-line state machine
//!
//! ```text
//! NoLine --open--> Active(debt = 0) <--borrow/repay--> Active(debt > 0)
//!                    |                                    |
//!                    +-- full withdrawal / liquidation ---+--> Closed
//! Closed --add_collateral--> Active
//! ```
//!
//! Every operation works on a copy of the line: accrue interest, validate, drive the pool
//! (which validates before it mutates), then commit the line. Lock order is
//! manager -> pool -> reputation / rate model.

use std::collections::BTreeMap;

use accrue_common::math::{apply_bps, ltv_bps};
use accrue_common::types::units::BPS_DENOMINATOR;
use accrue_common::{
    AccrueError, AdminControl, Address, CreditSettings, LimitKind, Result, Shared, SharedClock,
    Timestamp, MAX_REPUTATION_SCORE,
};
use accrue_pool::{LendingPool, RepaymentSplit};
use accrue_rates::InterestRateModel;
use accrue_reputation::ReputationManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::line::CreditLine;

/// Admin-tunable credit parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditParameters {
    /// Fixed annual rate used when no rate model is attached
    pub interest_rate_bps: u64,
    /// Score from which the multiplier applies
    pub reputation_threshold: u16,
    /// Credit limit multiplier for reputable borrowers
    pub multiplier_bps: u64,
}

impl CreditParameters {
    fn validate(&self, liquidation_ltv_bps: u64) -> Result<()> {
        if self.interest_rate_bps > BPS_DENOMINATOR {
            return Err(AccrueError::InvalidParameters(format!(
                "interest rate {} exceeds 10000 bps",
                self.interest_rate_bps
            )));
        }
        if self.reputation_threshold > MAX_REPUTATION_SCORE {
            return Err(AccrueError::InvalidParameters(format!(
                "reputation threshold {} exceeds {}",
                self.reputation_threshold, MAX_REPUTATION_SCORE
            )));
        }
        if self.multiplier_bps < BPS_DENOMINATOR || self.multiplier_bps >= liquidation_ltv_bps {
            return Err(AccrueError::InvalidParameters(format!(
                "multiplier {} must be within [10000, {})",
                self.multiplier_bps, liquidation_ltv_bps
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of a line, interest included up to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditInfo {
    /// Collateral principal plus its earned interest
    pub collateral: u64,
    pub credit_limit: u64,
    pub borrowed: u64,
    pub interest: u64,
    pub total_debt: u64,
    pub due_date: Timestamp,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub principal: u64,
    pub interest: u64,
    pub on_time: bool,
    pub reputation_score: u16,
    pub split: RepaymentSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    pub seized: u64,
    pub debt_cleared: u64,
    pub principal_covered: u64,
    pub interest_covered: u64,
    pub bad_debt: u64,
    pub remaining_collateral: u64,
}

pub struct CreditManager {
    /// Identity used when calling the pool and reputation manager
    address: Address,
    control: AdminControl,
    settings: CreditSettings,
    pool: Shared<LendingPool>,
    reputation: Shared<ReputationManager>,
    rate_model: Option<Shared<InterestRateModel>>,
    lines: BTreeMap<Address, CreditLine>,
    /// Borrowers in the order their lines were opened
    borrowers: Vec<Address>,
    clock: SharedClock,
}

impl CreditManager {
    pub fn new(
        address: Address,
        admin: Address,
        settings: CreditSettings,
        pool: Shared<LendingPool>,
        reputation: Shared<ReputationManager>,
        clock: SharedClock,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            address,
            control: AdminControl::new(admin),
            settings,
            pool,
            reputation,
            rate_model: None,
            lines: BTreeMap::new(),
            borrowers: Vec::new(),
            clock,
        })
    }

    pub fn with_rate_model(mut self, model: Shared<InterestRateModel>) -> Self {
        self.rate_model = Some(model);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn settings(&self) -> &CreditSettings {
        &self.settings
    }

    pub fn parameters(&self) -> CreditParameters {
        CreditParameters {
            interest_rate_bps: self.settings.interest_rate_bps,
            reputation_threshold: self.settings.reputation_threshold,
            multiplier_bps: self.settings.multiplier_bps,
        }
    }

    pub fn control(&self) -> &AdminControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut AdminControl {
        &mut self.control
    }

    pub fn has_rate_model(&self) -> bool {
        self.rate_model.is_some()
    }

    // ============ RATE & LIMIT ============

    /// Annual borrow rate: the rate model at current utilization, else the fixed rate
    fn annual_rate_bps(&self, pool: &LendingPool) -> u64 {
        match &self.rate_model {
            Some(model) => model.read().rate(pool.get_utilization_rate()),
            None => self.settings.interest_rate_bps,
        }
    }

    fn grace_period(&self) -> u64 {
        match &self.rate_model {
            Some(model) => model.read().grace_period(),
            None => self.settings.grace_period_secs,
        }
    }

    fn accrue(&self, line: &mut CreditLine, pool: &LendingPool, now: Timestamp) -> Result<()> {
        let rate = self.annual_rate_bps(pool);
        let added = line.accrue(rate, self.grace_period(), now)?;
        if added > 0 {
            debug!(added, rate, total = line.interest_accrued, "interest accrued");
        }
        Ok(())
    }

    /// Collateral plus earned interest, scaled up for borrowers above the reputation threshold
    fn credit_limit(&self, borrower: &Address, pool: &LendingPool) -> Result<u64> {
        let (_, _, collateral) = pool.get_collateral_with_interest(borrower);
        let score = self.reputation.read().get_reputation_score(borrower);
        if score >= self.settings.reputation_threshold {
            apply_bps(collateral, self.settings.multiplier_bps)
        } else {
            Ok(collateral)
        }
    }

    fn line(&self, borrower: &Address) -> Result<CreditLine> {
        self.lines
            .get(borrower)
            .cloned()
            .ok_or_else(|| AccrueError::NotFound(format!("no credit line for {}", borrower.short())))
    }

    fn is_eligible(&self, line: &CreditLine, collateral: u64, now: Timestamp) -> bool {
        let debt = line.total_debt();
        if debt == 0 {
            return false;
        }
        let over_ltv = match ltv_bps(debt, collateral) {
            Some(ltv) => ltv > self.settings.liquidation_ltv_bps,
            None => true,
        };
        over_ltv || line.is_overdue(now)
    }

    // ============ LIFECYCLE ============

    #[instrument(skip(self, borrower), fields(borrower = %borrower.short()))]
    pub fn open_credit_line(&mut self, borrower: &Address, collateral: u64) -> Result<()> {
        self.control.ensure_not_paused()?;
        if self.lines.contains_key(borrower) {
            return Err(AccrueError::AlreadyExists(format!(
                "credit line for {}",
                borrower.short()
            )));
        }
        if collateral == 0 || collateral < self.settings.min_collateral {
            return Err(AccrueError::invalid_amount(format!(
                "collateral {} below minimum {}",
                collateral, self.settings.min_collateral
            )));
        }
        self.reputation.read().ensure_writable_by(&self.address)?;

        let now = self.clock.now();
        let mut pool = self.pool.write();
        pool.deposit_collateral(&self.address, borrower, collateral)?;
        let score = self
            .reputation
            .write()
            .initialize_user(&self.address, borrower)?;

        self.lines.insert(*borrower, CreditLine::open(collateral, now));
        self.borrowers.push(*borrower);
        info!(collateral, score, "credit line opened");
        Ok(())
    }

    /// Post more collateral; reopens a closed line
    #[instrument(skip(self, borrower), fields(borrower = %borrower.short()))]
    pub fn add_collateral(&mut self, borrower: &Address, amount: u64) -> Result<()> {
        self.control.ensure_not_paused()?;
        let mut line = self.line(borrower)?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("collateral must be positive"));
        }

        let now = self.clock.now();
        let mut pool = self.pool.write();
        self.accrue(&mut line, &pool, now)?;
        pool.deposit_collateral(&self.address, borrower, amount)?;

        let (principal, _, _) = pool.get_collateral_with_interest(borrower);
        let reactivated = !line.is_active;
        line.initial_collateral = principal;
        line.is_active = true;
        self.lines.insert(*borrower, line);

        info!(amount, collateral = principal, reactivated, "collateral added");
        Ok(())
    }

    pub fn borrow(&mut self, borrower: &Address, amount: u64) -> Result<u64> {
        self.borrow_to(borrower, borrower, amount)
    }

    /// Borrow against `borrower`'s line and pay `recipient` directly
    pub fn borrow_and_pay(
        &mut self,
        borrower: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<u64> {
        if recipient.is_zero() || recipient == borrower {
            return Err(AccrueError::invalid_amount(
                "recipient must be a third party",
            ));
        }
        self.borrow_to(borrower, recipient, amount)
    }

    #[instrument(skip(self, borrower, recipient), fields(borrower = %borrower.short(), recipient = %recipient.short()))]
    fn borrow_to(&mut self, borrower: &Address, recipient: &Address, amount: u64) -> Result<u64> {
        self.control.ensure_not_paused()?;
        if amount == 0 || amount < self.settings.min_borrow {
            return Err(AccrueError::invalid_amount(format!(
                "borrow {} below minimum {}",
                amount, self.settings.min_borrow
            )));
        }
        let mut line = self.line(borrower)?;

        let now = self.clock.now();
        let mut pool = self.pool.write();
        self.accrue(&mut line, &pool, now)?;
        if !line.is_active {
            return Err(AccrueError::invalid_state("credit line is closed"));
        }

        let limit = self.credit_limit(borrower, &pool)?;
        let requested = line
            .total_debt()
            .checked_add(amount)
            .ok_or(AccrueError::Overflow)?;
        if requested > limit {
            warn!(requested, limit, "borrow exceeds credit limit");
            return Err(AccrueError::ExceedsLimit {
                kind: LimitKind::CreditLimit,
                requested,
                limit,
            });
        }
        let due_date = now
            .saturating_add(self.grace_period())
            .saturating_add(self.settings.repayment_window_secs);

        pool.borrow_for_payment(&self.address, recipient, amount)?;

        // the grace window opens with the first draw of a debt cycle; later draws share it
        if line.borrowed_amount == 0 {
            line.last_borrowed_at = now;
        }
        line.borrowed_amount += amount;
        line.due_date = due_date;
        self.lines.insert(*borrower, line);

        info!(amount, debt = requested, limit, due_date, "borrowed");
        Ok(amount)
    }

    #[instrument(skip(self, borrower), fields(borrower = %borrower.short()))]
    pub fn repay(
        &mut self,
        borrower: &Address,
        principal: u64,
        interest: u64,
    ) -> Result<RepaymentReceipt> {
        let mut line = self.line(borrower)?;
        let amount = principal
            .checked_add(interest)
            .ok_or(AccrueError::Overflow)?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("repayment must be positive"));
        }

        let now = self.clock.now();
        let mut pool = self.pool.write();
        self.accrue(&mut line, &pool, now)?;
        if principal > line.borrowed_amount {
            return Err(AccrueError::ExceedsLimit {
                kind: LimitKind::BorrowedAmount,
                requested: principal,
                limit: line.borrowed_amount,
            });
        }
        if interest > line.interest_accrued {
            return Err(AccrueError::ExceedsLimit {
                kind: LimitKind::InterestAmount,
                requested: interest,
                limit: line.interest_accrued,
            });
        }
        let on_time = line.is_on_time(now);
        self.reputation.read().ensure_writable_by(&self.address)?;

        let split = pool.receive_repayment(&self.address, borrower, principal, interest, borrower)?;

        line.borrowed_amount -= principal;
        line.interest_accrued -= interest;
        line.total_repaid = line.total_repaid.saturating_add(amount);
        if on_time {
            line.on_time_count += 1;
        } else {
            line.late_count += 1;
        }
        let reputation_score =
            self.reputation
                .write()
                .update_reputation(&self.address, borrower, on_time, amount)?;
        self.lines.insert(*borrower, line);

        info!(principal, interest, on_time, reputation_score, "repaid");
        Ok(RepaymentReceipt {
            principal,
            interest,
            on_time,
            reputation_score,
            split,
        })
    }

    /// Return collateral to a debt-free borrower
    ///
    /// Withdrawing at least the posted principal also claims earned interest; smaller
    /// withdrawals forfeit the withdrawn share of it.
    #[instrument(skip(self, borrower), fields(borrower = %borrower.short()))]
    pub fn withdraw_collateral(&mut self, borrower: &Address, amount: u64) -> Result<u64> {
        let mut line = self.line(borrower)?;
        if amount == 0 {
            return Err(AccrueError::invalid_amount("withdraw amount must be positive"));
        }

        let now = self.clock.now();
        let mut pool = self.pool.write();
        self.accrue(&mut line, &pool, now)?;
        if line.has_debt() {
            return Err(AccrueError::invalid_state(format!(
                "outstanding debt {}",
                line.total_debt()
            )));
        }
        let (principal, _, total) = pool.get_collateral_with_interest(borrower);
        if amount > total {
            return Err(AccrueError::invalid_amount(format!(
                "withdraw {} exceeds collateral {}",
                amount, total
            )));
        }
        let include_interest = amount >= principal;

        pool.withdraw_collateral(&self.address, borrower, amount, include_interest)?;

        let (remaining_principal, _, remaining) = pool.get_collateral_with_interest(borrower);
        line.initial_collateral = remaining_principal;
        if remaining == 0 {
            line.is_active = false;
        }
        let closed = !line.is_active;
        self.lines.insert(*borrower, line);

        info!(amount, include_interest, remaining, closed, "collateral withdrawn");
        Ok(amount)
    }

    /// Seize collateral against an under-collateralized or overdue line
    #[instrument(skip(self, caller, borrower), fields(borrower = %borrower.short()))]
    pub fn liquidate(&mut self, caller: &Address, borrower: &Address) -> Result<Liquidation> {
        self.control.ensure_admin(caller)?;
        let mut line = self.line(borrower)?;

        let now = self.clock.now();
        let mut pool = self.pool.write();
        self.accrue(&mut line, &pool, now)?;
        let (_, _, collateral) = pool.get_collateral_with_interest(borrower);
        if !self.is_eligible(&line, collateral, now) {
            return Err(AccrueError::invalid_state(format!(
                "line not liquidatable: debt {}, collateral {}",
                line.total_debt(),
                collateral
            )));
        }

        let debt = line.total_debt();
        let seized = debt.min(collateral);
        let seizure = pool.seize_collateral(&self.address, borrower, seized, line.borrowed_amount)?;

        let (remaining_principal, _, remaining) = pool.get_collateral_with_interest(borrower);
        line.borrowed_amount = 0;
        line.interest_accrued = 0;
        line.initial_collateral = remaining_principal;
        if remaining == 0 {
            line.is_active = false;
        }
        self.lines.insert(*borrower, line);

        warn!(
            debt,
            seized,
            bad_debt = seizure.bad_debt,
            remaining,
            "credit line liquidated"
        );
        Ok(Liquidation {
            seized,
            debt_cleared: debt,
            principal_covered: seizure.principal_covered,
            interest_covered: seizure.interest_covered,
            bad_debt: seizure.bad_debt,
            remaining_collateral: remaining,
        })
    }

    // ============ ADMIN ============

    #[instrument(skip(self, caller))]
    pub fn update_parameters(&mut self, caller: &Address, params: CreditParameters) -> Result<()> {
        self.control.ensure_admin(caller)?;
        self.control.ensure_not_paused()?;
        params.validate(self.settings.liquidation_ltv_bps)?;

        self.settings.interest_rate_bps = params.interest_rate_bps;
        self.settings.reputation_threshold = params.reputation_threshold;
        self.settings.multiplier_bps = params.multiplier_bps;
        info!(
            rate = params.interest_rate_bps,
            threshold = params.reputation_threshold,
            multiplier = params.multiplier_bps,
            "credit parameters updated"
        );
        Ok(())
    }

    /// Attach or detach the utilization-based rate model
    pub fn set_rate_model(
        &mut self,
        caller: &Address,
        model: Option<Shared<InterestRateModel>>,
    ) -> Result<()> {
        self.control.ensure_admin(caller)?;
        info!(attached = model.is_some(), "rate model changed");
        self.rate_model = model;
        Ok(())
    }

    // ============ VIEWS ============

    pub fn get_credit_line(&self, borrower: &Address) -> Option<&CreditLine> {
        self.lines.get(borrower)
    }

    pub fn get_borrowers(&self) -> &[Address] {
        &self.borrowers
    }

    pub fn get_credit_info(&self, borrower: &Address) -> Result<CreditInfo> {
        let line = self.line(borrower)?;
        let pool = self.pool.read();
        let now = self.clock.now();

        let pending = line.pending_interest(self.annual_rate_bps(&pool), self.grace_period(), now)?;
        let interest = line.interest_accrued.saturating_add(pending);
        let (_, _, collateral) = pool.get_collateral_with_interest(borrower);
        Ok(CreditInfo {
            collateral,
            credit_limit: self.credit_limit(borrower, &pool)?,
            borrowed: line.borrowed_amount,
            interest,
            total_debt: line.borrowed_amount.saturating_add(interest),
            due_date: line.due_date,
            is_active: line.is_active,
        })
    }

    pub fn get_credit_limit(&self, borrower: &Address) -> Result<u64> {
        let pool = self.pool.read();
        self.credit_limit(borrower, &pool)
    }

    /// Whether `liquidate` would succeed right now
    pub fn is_liquidatable(&self, borrower: &Address) -> Result<bool> {
        let mut line = self.line(borrower)?;
        let pool = self.pool.read();
        let now = self.clock.now();
        self.accrue(&mut line, &pool, now)?;
        let (_, _, collateral) = pool.get_collateral_with_interest(borrower);
        Ok(self.is_eligible(&line, collateral, now))
    }

    /// Current annual borrow rate in bps
    pub fn current_rate_bps(&self) -> u64 {
        let pool = self.pool.read();
        self.annual_rate_bps(&pool)
    }
}
