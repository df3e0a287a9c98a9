//! Reputation aggregate
//!
//! Only the registered updater (the credit manager) may write; anyone may read.

use std::collections::BTreeMap;

use accrue_common::{AccrueError, AdminControl, Address, Result, SharedClock};
use tracing::{debug, info, instrument};

use crate::score::{ReputationRecord, DEFAULT_SCORE};

pub struct ReputationManager {
    control: AdminControl,
    updater: Option<Address>,
    records: BTreeMap<Address, ReputationRecord>,
    clock: SharedClock,
}

impl ReputationManager {
    pub fn new(admin: Address, clock: SharedClock) -> Self {
        Self {
            control: AdminControl::new(admin),
            updater: None,
            records: BTreeMap::new(),
            clock,
        }
    }

    pub fn control(&self) -> &AdminControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut AdminControl {
        &mut self.control
    }

    pub fn updater(&self) -> Option<Address> {
        self.updater
    }

    /// Register the single identity allowed to write records
    pub fn set_updater(&mut self, caller: &Address, updater: Address) -> Result<()> {
        self.control.ensure_admin(caller)?;
        if updater.is_zero() {
            return Err(AccrueError::InvalidParameters("updater must be non-zero".into()));
        }
        self.updater = Some(updater);
        info!(updater = %updater.short(), "reputation updater set");
        Ok(())
    }

    /// Fail unless `caller` may write records right now
    pub fn ensure_writable_by(&self, caller: &Address) -> Result<()> {
        match self.updater {
            Some(updater) if updater == *caller => self.control.ensure_not_paused(),
            _ => Err(AccrueError::not_authorized(format!(
                "{} may not update reputation",
                caller.short()
            ))),
        }
    }

    /// Create a record for `user` if none exists; returns the current score
    pub fn initialize_user(&mut self, caller: &Address, user: &Address) -> Result<u16> {
        self.ensure_writable_by(caller)?;
        let now = self.clock.now();
        let record = self.records.entry(*user).or_insert_with(|| {
            debug!(user = %user.short(), "reputation record created");
            ReputationRecord::new(now)
        });
        Ok(record.score)
    }

    /// Apply a repayment to `user`'s history; returns the new score
    #[instrument(skip(self, caller, user), fields(user = %user.short()))]
    pub fn update_reputation(
        &mut self,
        caller: &Address,
        user: &Address,
        on_time: bool,
        amount_repaid: u64,
    ) -> Result<u16> {
        self.ensure_writable_by(caller)?;

        let now = self.clock.now();
        let record = self
            .records
            .entry(*user)
            .or_insert_with(|| ReputationRecord::new(now));
        let previous = record.score;
        record.record_repayment(on_time, amount_repaid, now);

        info!(previous, score = record.score, on_time, "reputation updated");
        Ok(record.score)
    }

    /// Current score; users without history sit at the default score
    pub fn get_reputation_score(&self, user: &Address) -> u16 {
        self.records
            .get(user)
            .map(|r| r.score)
            .unwrap_or(DEFAULT_SCORE)
    }

    pub fn get_reputation(&self, user: &Address) -> Option<&ReputationRecord> {
        self.records.get(user)
    }

    pub fn meets_threshold(&self, user: &Address, min_score: u16) -> bool {
        self.get_reputation_score(user) >= min_score
    }

    pub fn user_count(&self) -> usize {
        self.records.len()
    }
}
