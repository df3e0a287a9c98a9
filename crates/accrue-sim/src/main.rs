//! Accrue simulator
//!
//! Runs a scripted lender/borrower lifecycle against one in-memory deployment on a
//! manual clock and prints the resulting state as JSON.
//!
//! Usage: `accrue-sim [config-file]`. `ACCRUE__*` environment variables override the file.

use std::sync::Arc;

use accrue_common::telemetry::init_tracing;
use accrue_common::types::units::{bps_to_percent, from_token_units, to_token_units};
use accrue_common::{
    Address, InMemoryToken, ManualClock, ProtocolConfig, TimeSource, ValueStore, VERSION,
};
use accrue_credit::{CreditInfo, CreditProtocol, Liquidation, RepaymentReceipt};
use accrue_pool::PoolSnapshot;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

const DAY: u64 = 24 * 60 * 60;
const GENESIS: u64 = 1_700_000_000;

#[derive(Serialize)]
struct BorrowerReport {
    name: &'static str,
    address: Address,
    credit: CreditInfo,
    reputation_score: u16,
    wallet: Decimal,
}

#[derive(Serialize)]
struct LenderReport {
    name: &'static str,
    address: Address,
    principal: Decimal,
    earned_interest: Decimal,
    wallet: Decimal,
}

#[derive(Serialize)]
struct Report {
    version: &'static str,
    elapsed_days: u64,
    borrow_rate_percent: Decimal,
    repayment: RepaymentReceipt,
    liquidation: Liquidation,
    lenders: Vec<LenderReport>,
    borrowers: Vec<BorrowerReport>,
    pool: PoolSnapshot,
}

struct Sim {
    protocol: CreditProtocol,
    token: Arc<InMemoryToken>,
    clock: Arc<ManualClock>,
    decimals: u32,
}

impl Sim {
    fn units(&self, whole: u64) -> Result<u64> {
        from_token_units(Decimal::from(whole), self.decimals)
            .with_context(|| format!("{} tokens overflow the ledger", whole))
    }

    fn display(&self, amount: u64) -> Decimal {
        to_token_units(amount, self.decimals)
    }

    fn account(&self, name: &str, whole: u64) -> Result<Address> {
        let address = Address::derive(name);
        if whole > 0 {
            self.token.mint(&address, self.units(whole)?)?;
        }
        Ok(address)
    }

    fn wait_days(&self, days: u64) {
        let now = self.clock.advance(days * DAY);
        info!(days, now, "time advanced");
    }
}

fn main() -> Result<()> {
    init_tracing();
    info!("Starting Accrue simulator v{}", VERSION);

    let path = std::env::args().nth(1);
    let config = ProtocolConfig::load(path.as_deref()).context("loading configuration")?;
    info!(
        min_collateral = config.credit.min_collateral,
        fee_rate_bps = config.pool.fee_rate_bps,
        "configuration loaded"
    );

    let decimals = config.token_decimals;
    let token = InMemoryToken::shared("USDC", decimals);
    let clock = ManualClock::shared(GENESIS);
    let protocol = CreditProtocol::new(config, token.clone(), clock.clone())?;
    let sim = Sim {
        protocol,
        token,
        clock,
        decimals,
    };

    let admin = sim.account("admin", 0)?;
    let deployment = sim.protocol.deploy(admin, true)?;
    let owner = deployment.owner;

    let alice = sim.account("alice", 10_000)?;
    let bob = sim.account("bob", 5_000)?;
    let carol = sim.account("carol", 5_000)?;
    let dave = sim.account("dave", 1_000)?;
    let merchant = sim.account("merchant", 0)?;
    let treasury = sim.account("treasury", 0)?;

    // liquidity
    sim.protocol.deposit(&alice, &owner, sim.units(10_000)?)?;
    sim.protocol.deposit(&bob, &owner, sim.units(5_000)?)?;

    // credit lines
    sim.protocol.open_credit_line(&carol, &owner, sim.units(2_000)?)?;
    sim.protocol.open_credit_line(&dave, &owner, sim.units(1_000)?)?;
    sim.protocol
        .borrow_and_pay(&carol, &owner, &merchant, sim.units(1_500)?)?;
    sim.protocol.borrow(&dave, &owner, sim.units(900)?)?;
    let borrow_rate = sim.protocol.get_borrow_rate(&owner)?;
    info!(rate = %bps_to_percent(borrow_rate), "borrow rate after draws");

    // carol pays back in full before the due date
    sim.wait_days(20);
    let owed = sim.protocol.get_credit_info(&owner, &carol)?;
    let repayment = sim
        .protocol
        .repay(&carol, &owner, owed.borrowed, owed.interest)?;

    // dave misses the due date and is liquidated
    sim.wait_days(40);
    let liquidation = sim.protocol.liquidate(&admin, &owner, &dave)?;

    // exits
    let claimed = sim.protocol.claim_interest(&alice, &owner)?;
    info!(claimed = %sim.display(claimed), "alice claimed interest");
    let (_, _, carol_total) = sim.protocol.get_collateral_with_interest(&owner, &carol)?;
    sim.protocol.withdraw_collateral(&carol, &owner, carol_total)?;
    let fees = sim.protocol.get_pool_stats(&owner)?.protocol_fees_collected;
    if fees > 0 {
        sim.protocol.withdraw_fees(&admin, &owner, &treasury, fees)?;
    }

    let lenders = [("alice", alice), ("bob", bob)]
        .into_iter()
        .map(|(name, address)| -> Result<LenderReport> {
            let (principal, earned) = sim.protocol.get_lender_info(&owner, &address)?;
            Ok(LenderReport {
                name,
                address,
                principal: sim.display(principal),
                earned_interest: sim.display(earned),
                wallet: sim.display(sim.token.balance_of(&address)),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let borrowers = [("carol", carol), ("dave", dave)]
        .into_iter()
        .map(|(name, address)| -> Result<BorrowerReport> {
            Ok(BorrowerReport {
                name,
                address,
                credit: sim.protocol.get_credit_info(&owner, &address)?,
                reputation_score: sim.protocol.get_reputation_score(&owner, &address)?,
                wallet: sim.display(sim.token.balance_of(&address)),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let report = Report {
        version: VERSION,
        elapsed_days: (sim.clock.now() - GENESIS) / DAY,
        borrow_rate_percent: bps_to_percent(borrow_rate),
        repayment,
        liquidation,
        lenders,
        borrowers,
        pool: sim.protocol.pool_snapshot(&owner)?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(
        solvent = sim.protocol.pool(&owner)?.read().is_solvent(),
        "simulation complete"
    );
    Ok(())
}
