//! Interest-rate model aggregate

use accrue_common::math::{apply_bps, lerp};
use accrue_common::types::units::{bps_to_percent, BPS_DENOMINATOR};
use accrue_common::{
    AccrueError, AdminControl, Address, RateSettings, Result, SharedClock, Timestamp,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Rate curve parameters, all rates and utilizations in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateParameters {
    pub base_rate: u64,
    pub max_rate: u64,
    pub penalty_rate: u64,
    pub optimal_utilization: u64,
    pub penalty_utilization: u64,
    /// Seconds after a borrow before interest starts to accrue
    pub grace_period: u64,
}

impl RateParameters {
    /// Enforce `base <= max <= penalty` and `optimal <= penalty_utilization <= 10000`
    pub fn validate(&self) -> Result<()> {
        if !(self.base_rate <= self.max_rate && self.max_rate <= self.penalty_rate) {
            return Err(AccrueError::InvalidParameters(format!(
                "rates must satisfy base <= max <= penalty, got {} / {} / {}",
                self.base_rate, self.max_rate, self.penalty_rate
            )));
        }
        if self.optimal_utilization > self.penalty_utilization {
            return Err(AccrueError::InvalidParameters(format!(
                "optimal utilization {} above penalty utilization {}",
                self.optimal_utilization, self.penalty_utilization
            )));
        }
        if self.penalty_utilization > BPS_DENOMINATOR {
            return Err(AccrueError::InvalidParameters(
                "penalty utilization exceeds 10000".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RateParameters {
    fn default() -> Self {
        Self::from(&RateSettings::default())
    }
}

impl From<&RateSettings> for RateParameters {
    fn from(settings: &RateSettings) -> Self {
        Self {
            base_rate: settings.base_rate_bps,
            max_rate: settings.max_rate_bps,
            penalty_rate: settings.penalty_rate_bps,
            optimal_utilization: settings.optimal_utilization_bps,
            penalty_utilization: settings.penalty_utilization_bps,
            grace_period: settings.grace_period_secs,
        }
    }
}

/// Utilization -> annual rate, plus the grace-period clock check
pub struct InterestRateModel {
    control: AdminControl,
    params: RateParameters,
    clock: SharedClock,
}

impl InterestRateModel {
    pub fn new(admin: Address, params: RateParameters, clock: SharedClock) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            control: AdminControl::new(admin),
            params,
            clock,
        })
    }

    pub fn params(&self) -> &RateParameters {
        &self.params
    }

    pub fn control(&self) -> &AdminControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut AdminControl {
        &mut self.control
    }

    pub fn grace_period(&self) -> u64 {
        self.params.grace_period
    }

    /// Annual borrow rate in bps for a utilization in bps
    pub fn rate(&self, utilization_bps: u64) -> u64 {
        let p = &self.params;
        if utilization_bps < p.optimal_utilization {
            lerp(p.base_rate, p.max_rate, utilization_bps, p.optimal_utilization)
        } else if utilization_bps < p.penalty_utilization {
            lerp(
                p.max_rate,
                p.penalty_rate,
                utilization_bps - p.optimal_utilization,
                p.penalty_utilization - p.optimal_utilization,
            )
        } else {
            p.penalty_rate
        }
    }

    /// Rate earned by depositors: borrow rate scaled by utilization, net of the fee
    pub fn supply_rate(&self, utilization_bps: u64, fee_rate_bps: u64) -> Result<u64> {
        let utilization = utilization_bps.min(BPS_DENOMINATOR);
        let gross = apply_bps(self.rate(utilization_bps), utilization)?;
        apply_bps(gross, BPS_DENOMINATOR.saturating_sub(fee_rate_bps))
    }

    /// Borrow rate as a percentage, for display
    pub fn rate_percent(&self, utilization_bps: u64) -> Decimal {
        bps_to_percent(self.rate(utilization_bps))
    }

    /// `now > borrow_timestamp + grace_period`
    pub fn is_grace_period_ended(&self, borrow_timestamp: Timestamp) -> bool {
        self.clock.now() > borrow_timestamp.saturating_add(self.params.grace_period)
    }

    #[instrument(skip(self))]
    pub fn update_parameters(&mut self, caller: &Address, params: RateParameters) -> Result<()> {
        self.control.ensure_admin(caller)?;
        self.control.ensure_not_paused()?;
        params.validate()?;
        self.params = params;
        info!(
            base = params.base_rate,
            max = params.max_rate,
            penalty = params.penalty_rate,
            "rate parameters updated"
        );
        Ok(())
    }
}
