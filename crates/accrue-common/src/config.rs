//! Protocol configuration
//!
//! Defaults live in code. `ProtocolConfig::load` layers an optional file and
//! `ACCRUE__`-prefixed environment variables on top, e.g.
//! `ACCRUE__CREDIT__INTEREST_RATE_BPS=750`.

use serde::{Deserialize, Serialize};

use crate::error::{AccrueError, Result};
use crate::types::units::{BPS_DENOMINATOR, DEFAULT_TOKEN_DECIMALS};
use crate::MAX_REPUTATION_SCORE;

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "ACCRUE";

/// Top-level configuration for one protocol deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Decimals of the underlying token
    pub token_decimals: u32,
    /// Liquidity pool settings
    pub pool: PoolSettings,
    /// Credit manager settings
    pub credit: CreditSettings,
    /// Interest-rate model defaults
    pub rates: RateSettings,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            pool: PoolSettings::default(),
            credit: CreditSettings::default(),
            rates: RateSettings::default(),
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from defaults, an optional file, then the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let cfg: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Enforce the ordering invariants between settings
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.credit.validate()?;
        self.rates.validate()
    }
}

/// Liquidity pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Smallest accepted lender deposit
    pub min_deposit: u64,
    /// Share of repaid interest kept as protocol fee
    pub fee_rate_bps: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_deposit: 1_000,
            fee_rate_bps: 1_000,
        }
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<()> {
        if self.fee_rate_bps > BPS_DENOMINATOR {
            return Err(AccrueError::Config(format!(
                "fee_rate_bps {} exceeds 10000",
                self.fee_rate_bps
            )));
        }
        Ok(())
    }
}

/// Credit manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSettings {
    /// Smallest collateral accepted when opening a line
    pub min_collateral: u64,
    /// Smallest single borrow
    pub min_borrow: u64,
    /// Fixed annual rate used when no rate model is attached
    pub interest_rate_bps: u64,
    /// Interest-free interval after each borrow
    pub grace_period_secs: u64,
    /// Time after the grace period before a borrow is due
    pub repayment_window_secs: u64,
    /// Debt/collateral ratio above which a line may be liquidated
    pub liquidation_ltv_bps: u64,
    /// Reputation score from which the credit multiplier applies
    pub reputation_threshold: u16,
    /// Credit limit multiplier for borrowers at or above the threshold
    pub multiplier_bps: u64,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            min_collateral: 1_000_000,
            min_borrow: 100_000,
            interest_rate_bps: 1_000,
            grace_period_secs: 3 * 24 * 60 * 60,
            repayment_window_secs: 30 * 24 * 60 * 60,
            liquidation_ltv_bps: 11_000,
            reputation_threshold: 800,
            multiplier_bps: 10_500,
        }
    }
}

impl CreditSettings {
    pub fn validate(&self) -> Result<()> {
        if self.interest_rate_bps > BPS_DENOMINATOR {
            return Err(AccrueError::Config("interest_rate_bps exceeds 10000".into()));
        }
        if self.liquidation_ltv_bps <= BPS_DENOMINATOR {
            return Err(AccrueError::Config(
                "liquidation_ltv_bps must exceed 10000".into(),
            ));
        }
        if self.reputation_threshold > MAX_REPUTATION_SCORE {
            return Err(AccrueError::Config(
                "reputation_threshold exceeds 1000".into(),
            ));
        }
        if self.multiplier_bps < BPS_DENOMINATOR || self.multiplier_bps >= self.liquidation_ltv_bps
        {
            return Err(AccrueError::Config(format!(
                "multiplier_bps {} must be within [10000, {})",
                self.multiplier_bps, self.liquidation_ltv_bps
            )));
        }
        Ok(())
    }
}

/// Interest-rate model defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSettings {
    pub base_rate_bps: u64,
    pub max_rate_bps: u64,
    pub penalty_rate_bps: u64,
    pub optimal_utilization_bps: u64,
    pub penalty_utilization_bps: u64,
    pub grace_period_secs: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            base_rate_bps: 200,
            max_rate_bps: 1_000,
            penalty_rate_bps: 5_000,
            optimal_utilization_bps: 8_000,
            penalty_utilization_bps: 9_500,
            grace_period_secs: 3 * 24 * 60 * 60,
        }
    }
}

impl RateSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_rate_bps <= self.max_rate_bps && self.max_rate_bps <= self.penalty_rate_bps)
        {
            return Err(AccrueError::InvalidParameters(
                "rates must satisfy base <= max <= penalty".into(),
            ));
        }
        if !(self.optimal_utilization_bps <= self.penalty_utilization_bps
            && self.penalty_utilization_bps <= BPS_DENOMINATOR)
        {
            return Err(AccrueError::InvalidParameters(
                "utilization thresholds must satisfy optimal <= penalty <= 10000".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        ProtocolConfig::default().validate().unwrap();
    }

    #[test]
    fn test_multiplier_must_stay_below_liquidation() {
        let mut credit = CreditSettings::default();
        credit.multiplier_bps = credit.liquidation_ltv_bps;
        assert!(matches!(credit.validate(), Err(AccrueError::Config(_))));

        credit.multiplier_bps = 9_000;
        assert!(credit.validate().is_err());
    }

    #[test]
    fn test_rate_ordering() {
        let mut rates = RateSettings::default();
        rates.max_rate_bps = rates.penalty_rate_bps + 1;
        assert!(matches!(
            rates.validate(),
            Err(AccrueError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_load_without_file() {
        let cfg = ProtocolConfig::load(None).unwrap();
        assert_eq!(cfg.pool.fee_rate_bps, PoolSettings::default().fee_rate_bps);
    }
}
