//! Scenario runner.
//!
//! Drives one owner through init market, init reserve, init obligation,
//! supply, borrow, repay and withdraw. Init steps whose record already
//! exists are skipped, so the scenario can run repeatedly on one ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use sealend_domain::{
    lending_market_address, obligation_address, reserve_address, Address, LendingMarket,
    Obligation, Reserve,
};
use sealend_exec::{CustodyPort, LendingProgram, StubCustody};
use sealend_store::MemoryStore;

use crate::config::Config;
use crate::error::{SimError, SimResult};

/// What one run moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Market address
    pub market: Address,
    /// Reserve address
    pub reserve: Address,
    /// Obligation address
    pub obligation: Address,
    /// Collateral minted by the supply
    pub collateral_minted: u64,
    /// Liquidity borrowed
    pub borrowed: u64,
    /// Liquidity repaid
    pub repaid: u64,
    /// Repay request above the debt, if any
    pub overpaid: Option<u64>,
    /// Collateral burned by the withdraw
    pub collateral_burned: u64,
    /// Liquidity returned by the withdraw
    pub liquidity_returned: u64,
    /// Owner's liquidity balance after the run
    pub final_balance: u64,
}

/// Program over stub custody and an in-memory store.
pub struct Simulation {
    config: Config,
    program: LendingProgram<StubCustody, MemoryStore>,
    custody: Arc<StubCustody>,
    store: Arc<MemoryStore>,
    owner: Address,
    liquidity_mint: Address,
}

impl Simulation {
    /// Wire the program and fund the owner.
    pub fn new(config: Config) -> SimResult<Self> {
        let custody = Arc::new(StubCustody::new());
        let store = Arc::new(MemoryStore::new());
        let owner = Address::from_label("sim-owner");
        let liquidity_mint = Address::from_label("sim-liquidity");

        custody.create_external_mint(liquidity_mint, config.protocol.collateral_decimals)?;
        custody.airdrop(liquidity_mint, owner, config.scenario.initial_balance)?;

        let program = LendingProgram::new(custody.clone(), store.clone(), config.protocol);
        Ok(Self { config, program, custody, store, owner, liquidity_mint })
    }

    /// The owner driven by the scenario
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The backing store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Run the full scenario once.
    pub async fn run(&self) -> SimResult<ScenarioReport> {
        let scenario = self.config.scenario;

        let market = self.ensure_market().await?;
        let reserve = self.ensure_reserve(&market).await?;
        let obligation = self.ensure_obligation(&market, &reserve).await?;

        let supplied = self.program.supply(self.owner, obligation.address, scenario.supply_amount).await?;
        info!(step = "supply", collateral = supplied.collateral_amount, "Step complete");

        let borrowed = self.program.borrow(self.owner, obligation.address, scenario.borrow_amount).await?;
        info!(step = "borrow", amount = borrowed.liquidity_amount, "Step complete");

        let repaid = self.program.repay(self.owner, obligation.address, scenario.borrow_amount).await?;
        info!(step = "repay", amount = repaid.liquidity_amount, "Step complete");

        let withdrawn = self
            .program
            .withdraw(self.owner, obligation.address, supplied.collateral_amount)
            .await?;
        info!(step = "withdraw", amount = withdrawn.liquidity_amount, "Step complete");

        let final_balance = self.custody.balance_of(self.liquidity_mint, self.owner).await?;

        Ok(ScenarioReport {
            market: market.address,
            reserve: reserve.address,
            obligation: obligation.address,
            collateral_minted: supplied.collateral_amount,
            borrowed: borrowed.liquidity_amount,
            repaid: repaid.liquidity_amount,
            overpaid: repaid.overpayment.map(|o| o.requested - o.repaid),
            collateral_burned: withdrawn.collateral_amount,
            liquidity_returned: withdrawn.liquidity_amount,
            final_balance,
        })
    }

    async fn ensure_market(&self) -> SimResult<LendingMarket> {
        if let Some(market) = self.program.market(lending_market_address(&self.owner)).await? {
            info!(step = "init_lending_market", market = %market.address, "Already initialized, skipping");
            return Ok(market);
        }
        Ok(self.program.init_lending_market(self.owner).await?)
    }

    async fn ensure_reserve(&self, market: &LendingMarket) -> SimResult<Reserve> {
        let key = reserve_address(&market.address, &self.liquidity_mint);
        if let Some(reserve) = self.program.reserve(key).await? {
            info!(step = "init_reserve", reserve = %reserve.address, "Already initialized, skipping");
            return Ok(reserve);
        }
        Ok(self.program.init_reserve(self.owner, market.address, self.liquidity_mint).await?)
    }

    async fn ensure_obligation(&self, market: &LendingMarket, reserve: &Reserve) -> SimResult<Obligation> {
        let key = obligation_address(&self.owner, &reserve.address);
        if let Some(obligation) = self.program.obligation(key).await? {
            if obligation.lending_market != market.address {
                return Err(SimError::Config(format!(
                    "obligation {} belongs to another market",
                    obligation.address
                )));
            }
            info!(step = "init_obligation", obligation = %obligation.address, "Already initialized, skipping");
            return Ok(obligation);
        }
        Ok(self.program.init_obligation(self.owner, market.address, reserve.address).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sealend_exec::ErrorKind;

    #[tokio::test]
    async fn test_scenario_round_trip() {
        let config = Config::test();
        let initial = config.scenario.initial_balance;
        let sim = Simulation::new(config).unwrap();

        let report = sim.run().await.unwrap();
        assert_eq!(report.collateral_minted, 200);
        assert_eq!(report.borrowed, 100);
        assert_eq!(report.repaid, 100);
        assert_eq!(report.overpaid, None);
        assert_eq!(report.liquidity_returned, 200);
        assert_eq!(report.final_balance, initial);
    }

    #[tokio::test]
    async fn test_rerun_skips_initialization() {
        let sim = Simulation::new(Config::test()).unwrap();

        let first = sim.run().await.unwrap();
        let events_after_first = sim.store().event_count();
        let second = sim.run().await.unwrap();

        assert_eq!(first.obligation, second.obligation);
        assert_eq!(sim.store().market_count(), 1);
        assert_eq!(sim.store().reserve_count(), 1);
        assert_eq!(sim.store().obligation_count(), 1);
        // supply, borrow, repay, withdraw only
        assert_eq!(sim.store().event_count(), events_after_first + 4);
    }

    #[tokio::test]
    async fn test_borrow_above_limit_fails() {
        let mut config = Config::test();
        config.scenario.borrow_amount = 101;
        let sim = Simulation::new(config).unwrap();

        match sim.run().await {
            Err(SimError::Exec(e)) => assert_eq!(e.kind(), ErrorKind::InsufficientCollateral),
            other => panic!("expected InsufficientCollateral, got {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes() {
        let report = ScenarioReport {
            market: Address::from_label("m"),
            reserve: Address::from_label("r"),
            obligation: Address::from_label("o"),
            collateral_minted: 1,
            borrowed: 0,
            repaid: 0,
            overpaid: None,
            collateral_burned: 1,
            liquidity_returned: 1,
            final_balance: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["liquidity_returned"], 1);
    }
}
