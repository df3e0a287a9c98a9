//! Protocol entry points
//!
//! Each deployment is four aggregates (pool, credit manager, reputation manager, rate
//! model) keyed by the deploying admin's address in their registries. Entry points take
//! the caller's identity explicitly and resolve the aggregate they act on by address.

use std::sync::Arc;

use accrue_common::{
    AccrueError, AdminControl, Address, ProtocolConfig, Registry, Result, Shared, SharedClock,
    SharedValueStore,
};
use accrue_pool::{LendingPool, PoolSnapshot, PoolStats};
use accrue_rates::{InterestRateModel, RateParameters};
use accrue_reputation::ReputationManager;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::manager::{CreditInfo, CreditManager, CreditParameters, Liquidation, RepaymentReceipt};

/// Aggregate kinds addressable by admin operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Pool,
    CreditManager,
    Reputation,
    RateModel,
}

/// Addresses of one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Registry key shared by all four aggregates
    pub owner: Address,
    /// Value-store account holding the pool's funds
    pub pool_account: Address,
    /// Identity the credit manager presents to the pool and reputation manager
    pub credit_manager: Address,
}

pub struct CreditProtocol {
    config: ProtocolConfig,
    token: SharedValueStore,
    clock: SharedClock,
    pools: Registry<LendingPool>,
    managers: Registry<CreditManager>,
    reputations: Registry<ReputationManager>,
    rate_models: Registry<InterestRateModel>,
}

impl CreditProtocol {
    pub fn new(config: ProtocolConfig, token: SharedValueStore, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            token,
            clock,
            pools: Registry::new("lending pool"),
            managers: Registry::new("credit manager"),
            reputations: Registry::new("reputation manager"),
            rate_models: Registry::new("rate model"),
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Deploy and wire a full protocol instance administered by `admin`
    ///
    /// With `use_rate_model` the credit manager prices debt from the utilization curve;
    /// otherwise it charges the configured fixed rate. The rate model is deployed either way.
    #[instrument(skip(self, admin), fields(admin = %admin.short()))]
    pub fn deploy(&self, admin: Address, use_rate_model: bool) -> Result<Deployment> {
        if self.pools.contains(&admin) {
            return Err(AccrueError::AlreadyExists(format!(
                "deployment at {}",
                admin.short()
            )));
        }
        let pool_account = Address::derive(&format!("accrue/pool/{}", admin.to_hex()));
        let cm_address = Address::derive(&format!("accrue/credit-manager/{}", admin.to_hex()));

        let mut pool = LendingPool::new(
            pool_account,
            admin,
            self.config.pool.clone(),
            self.token.clone(),
            self.clock.clone(),
        )?;
        pool.set_credit_manager(&admin, cm_address)?;

        let mut reputation = ReputationManager::new(admin, self.clock.clone());
        reputation.set_updater(&admin, cm_address)?;

        let rate_model = InterestRateModel::new(
            admin,
            RateParameters::from(&self.config.rates),
            self.clock.clone(),
        )?;

        // everything is built before anything is published
        let pool = Arc::new(RwLock::new(pool));
        let reputation = Arc::new(RwLock::new(reputation));
        let rate_model = Arc::new(RwLock::new(rate_model));
        let mut manager = CreditManager::new(
            cm_address,
            admin,
            self.config.credit.clone(),
            pool.clone(),
            reputation.clone(),
            self.clock.clone(),
        )?;
        if use_rate_model {
            manager = manager.with_rate_model(rate_model.clone());
        }

        // the pool entry claims the owner key; the rest cannot collide once it is held
        self.pools.register(admin, pool)?;
        self.reputations.register(admin, reputation)?;
        self.rate_models.register(admin, rate_model)?;
        self.managers.create(admin, manager)?;

        info!(
            pool = %pool_account.short(),
            credit_manager = %cm_address.short(),
            use_rate_model,
            "protocol deployed"
        );
        Ok(Deployment {
            owner: admin,
            pool_account,
            credit_manager: cm_address,
        })
    }

    pub fn pool(&self, owner: &Address) -> Result<Shared<LendingPool>> {
        self.pools.get(owner)
    }

    pub fn credit_manager(&self, owner: &Address) -> Result<Shared<CreditManager>> {
        self.managers.get(owner)
    }

    pub fn reputation(&self, owner: &Address) -> Result<Shared<ReputationManager>> {
        self.reputations.get(owner)
    }

    pub fn rate_model(&self, owner: &Address) -> Result<Shared<InterestRateModel>> {
        self.rate_models.get(owner)
    }

    // ============ LENDERS ============

    pub fn deposit(&self, caller: &Address, owner: &Address, amount: u64) -> Result<()> {
        self.pools.get(owner)?.write().deposit(caller, amount)
    }

    pub fn withdraw(&self, caller: &Address, owner: &Address, amount: u64) -> Result<u64> {
        self.pools.get(owner)?.write().withdraw(caller, amount)
    }

    pub fn claim_interest(&self, caller: &Address, owner: &Address) -> Result<u64> {
        self.pools.get(owner)?.write().claim_interest(caller)
    }

    // ============ BORROWERS ============

    pub fn open_credit_line(&self, caller: &Address, owner: &Address, collateral: u64) -> Result<()> {
        self.managers
            .get(owner)?
            .write()
            .open_credit_line(caller, collateral)
    }

    pub fn add_collateral(&self, caller: &Address, owner: &Address, amount: u64) -> Result<()> {
        self.managers.get(owner)?.write().add_collateral(caller, amount)
    }

    pub fn borrow(&self, caller: &Address, owner: &Address, amount: u64) -> Result<u64> {
        self.managers.get(owner)?.write().borrow(caller, amount)
    }

    pub fn borrow_and_pay(
        &self,
        caller: &Address,
        owner: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<u64> {
        self.managers
            .get(owner)?
            .write()
            .borrow_and_pay(caller, recipient, amount)
    }

    pub fn repay(
        &self,
        caller: &Address,
        owner: &Address,
        principal: u64,
        interest: u64,
    ) -> Result<RepaymentReceipt> {
        self.managers
            .get(owner)?
            .write()
            .repay(caller, principal, interest)
    }

    pub fn withdraw_collateral(&self, caller: &Address, owner: &Address, amount: u64) -> Result<u64> {
        self.managers
            .get(owner)?
            .write()
            .withdraw_collateral(caller, amount)
    }

    pub fn liquidate(&self, caller: &Address, owner: &Address, borrower: &Address) -> Result<Liquidation> {
        self.managers.get(owner)?.write().liquidate(caller, borrower)
    }

    // ============ ADMIN ============

    fn with_control<R>(
        &self,
        component: Component,
        owner: &Address,
        op: impl FnOnce(&mut AdminControl) -> Result<R>,
    ) -> Result<R> {
        match component {
            Component::Pool => op(self.pools.get(owner)?.write().control_mut()),
            Component::CreditManager => op(self.managers.get(owner)?.write().control_mut()),
            Component::Reputation => op(self.reputations.get(owner)?.write().control_mut()),
            Component::RateModel => op(self.rate_models.get(owner)?.write().control_mut()),
        }
    }

    #[instrument(skip(self, caller, owner))]
    pub fn pause(&self, caller: &Address, component: Component, owner: &Address) -> Result<()> {
        self.with_control(component, owner, |control| control.pause(caller))
    }

    #[instrument(skip(self, caller, owner))]
    pub fn unpause(&self, caller: &Address, component: Component, owner: &Address) -> Result<()> {
        self.with_control(component, owner, |control| control.unpause(caller))
    }

    pub fn transfer_admin(
        &self,
        caller: &Address,
        component: Component,
        owner: &Address,
        new_admin: Address,
    ) -> Result<()> {
        self.with_control(component, owner, |control| {
            control.transfer_admin(caller, new_admin)
        })
    }

    pub fn accept_admin(&self, caller: &Address, component: Component, owner: &Address) -> Result<()> {
        self.with_control(component, owner, |control| control.accept_admin(caller))
    }

    pub fn cancel_admin_transfer(
        &self,
        caller: &Address,
        component: Component,
        owner: &Address,
    ) -> Result<()> {
        self.with_control(component, owner, |control| {
            control.cancel_admin_transfer(caller)
        })
    }

    pub fn update_parameters(
        &self,
        caller: &Address,
        owner: &Address,
        params: CreditParameters,
    ) -> Result<()> {
        self.managers
            .get(owner)?
            .write()
            .update_parameters(caller, params)
    }

    pub fn update_rate_parameters(
        &self,
        caller: &Address,
        owner: &Address,
        params: RateParameters,
    ) -> Result<()> {
        self.rate_models
            .get(owner)?
            .write()
            .update_parameters(caller, params)
    }

    pub fn withdraw_fees(&self, caller: &Address, owner: &Address, to: &Address, amount: u64) -> Result<()> {
        self.pools.get(owner)?.write().withdraw_fees(caller, to, amount)
    }

    // ============ VIEWS ============

    pub fn get_credit_info(&self, owner: &Address, borrower: &Address) -> Result<CreditInfo> {
        self.managers.get(owner)?.read().get_credit_info(borrower)
    }

    pub fn is_liquidatable(&self, owner: &Address, borrower: &Address) -> Result<bool> {
        self.managers.get(owner)?.read().is_liquidatable(borrower)
    }

    pub fn get_borrowers(&self, owner: &Address) -> Result<Vec<Address>> {
        Ok(self.managers.get(owner)?.read().get_borrowers().to_vec())
    }

    pub fn get_lender_info(&self, owner: &Address, lender: &Address) -> Result<(u64, u64)> {
        Ok(self.pools.get(owner)?.read().get_lender_info(lender))
    }

    pub fn get_collateral_with_interest(
        &self,
        owner: &Address,
        borrower: &Address,
    ) -> Result<(u64, u64, u64)> {
        Ok(self
            .pools
            .get(owner)?
            .read()
            .get_collateral_with_interest(borrower))
    }

    pub fn get_utilization_rate(&self, owner: &Address) -> Result<u64> {
        Ok(self.pools.get(owner)?.read().get_utilization_rate())
    }

    pub fn get_available_liquidity(&self, owner: &Address) -> Result<u64> {
        Ok(self.pools.get(owner)?.read().get_available_liquidity())
    }

    pub fn get_pool_stats(&self, owner: &Address) -> Result<PoolStats> {
        Ok(self.pools.get(owner)?.read().get_pool_stats())
    }

    pub fn pool_snapshot(&self, owner: &Address) -> Result<PoolSnapshot> {
        Ok(self.pools.get(owner)?.read().snapshot())
    }

    pub fn get_reputation_score(&self, owner: &Address, user: &Address) -> Result<u16> {
        Ok(self.reputations.get(owner)?.read().get_reputation_score(user))
    }

    /// Current borrow rate of the deployment's rate model at pool utilization
    pub fn get_borrow_rate(&self, owner: &Address) -> Result<u64> {
        let utilization = self.get_utilization_rate(owner)?;
        Ok(self.rate_models.get(owner)?.read().rate(utilization))
    }

    pub fn deployments(&self) -> usize {
        self.pools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_common::{
        CreditSettings, ErrorKind, InMemoryToken, ManualClock, PoolSettings,
    };

    fn protocol() -> (CreditProtocol, Arc<InMemoryToken>) {
        let token = InMemoryToken::shared("USDC", 6);
        let config = ProtocolConfig {
            pool: PoolSettings {
                min_deposit: 1,
                fee_rate_bps: 1_000,
            },
            credit: CreditSettings {
                min_collateral: 1,
                min_borrow: 1,
                ..CreditSettings::default()
            },
            ..ProtocolConfig::default()
        };
        let protocol =
            CreditProtocol::new(config, token.clone(), ManualClock::shared(1_000)).unwrap();
        (protocol, token)
    }

    #[test]
    fn test_deploy_wires_components() {
        let (protocol, _) = protocol();
        let admin = Address::derive("admin");
        let deployment = protocol.deploy(admin, false).unwrap();

        let pool = protocol.pool(&admin).unwrap();
        assert_eq!(pool.read().credit_manager(), Some(deployment.credit_manager));
        assert_eq!(pool.read().address(), deployment.pool_account);
        assert_eq!(
            protocol.reputation(&admin).unwrap().read().updater(),
            Some(deployment.credit_manager)
        );
        assert!(!protocol.credit_manager(&admin).unwrap().read().has_rate_model());

        let err = protocol.deploy(admin, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(protocol.deployments(), 1);
    }

    #[test]
    fn test_failed_deploy_can_be_retried() {
        let (mut protocol, _) = protocol();
        let admin = Address::derive("admin");
        protocol.config.credit.multiplier_bps = 9_000;

        let err = protocol.deploy(admin, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
        assert!(protocol.pool(&admin).is_err());
        assert!(protocol.reputation(&admin).is_err());
        assert!(protocol.rate_model(&admin).is_err());

        protocol.config.credit.multiplier_bps = 10_500;
        protocol.deploy(admin, true).unwrap();
        assert!(protocol.credit_manager(&admin).unwrap().read().has_rate_model());
    }

    #[test]
    fn test_unknown_deployment() {
        let (protocol, _) = protocol();
        let nobody = Address::derive("nobody");
        let err = protocol.deposit(&nobody, &nobody, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pause_by_component() {
        let (protocol, token) = protocol();
        let admin = Address::derive("admin");
        let lender = Address::derive("lender");
        token.mint(&lender, 100).unwrap();
        protocol.deploy(admin, false).unwrap();

        let err = protocol
            .pause(&lender, Component::Pool, &admin)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        protocol.pause(&admin, Component::Pool, &admin).unwrap();
        assert!(protocol.deposit(&lender, &admin, 10).is_err());
        protocol.unpause(&admin, Component::Pool, &admin).unwrap();
        protocol.deposit(&lender, &admin, 10).unwrap();
    }

    #[test]
    fn test_two_step_admin_transfer() {
        let (protocol, _) = protocol();
        let admin = Address::derive("admin");
        let successor = Address::derive("successor");
        protocol.deploy(admin, false).unwrap();

        protocol
            .transfer_admin(&admin, Component::CreditManager, &admin, successor)
            .unwrap();
        let err = protocol
            .accept_admin(&admin, Component::CreditManager, &admin)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        protocol
            .accept_admin(&successor, Component::CreditManager, &admin)
            .unwrap();
        let manager = protocol.credit_manager(&admin).unwrap();
        assert_eq!(manager.read().control().admin(), successor);
        // other components keep their admin
        assert_eq!(protocol.pool(&admin).unwrap().read().control().admin(), admin);
    }

    #[test]
    fn test_rate_parameters_update() {
        let (protocol, _) = protocol();
        let admin = Address::derive("admin");
        protocol.deploy(admin, true).unwrap();
        assert_eq!(protocol.get_borrow_rate(&admin).unwrap(), 200);

        let params = RateParameters {
            base_rate: 300,
            ..RateParameters::default()
        };
        protocol
            .update_rate_parameters(&admin, &admin, params)
            .unwrap();
        assert_eq!(protocol.get_borrow_rate(&admin).unwrap(), 300);
    }
}
