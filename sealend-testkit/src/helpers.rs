//! Seeding and inspection helpers.

use anyhow::{Context, Result};
use sealend_domain::{
    lending_market_address, obligation_address, reserve_address, Address, LendingMarket,
    Obligation, Reserve,
};
use sealend_exec::CustodyPort;

use crate::TestHarness;

/// Records created by [`open_position`]
#[derive(Debug, Clone)]
pub struct OpenPosition {
    /// The harness owner's market
    pub market: LendingMarket,
    /// Reserve for the harness liquidity mint
    pub reserve: Reserve,
    /// Obligation of the requested owner
    pub obligation: Obligation,
}

/// Custody balances backing a reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveBalances {
    /// Liquidity held in the reserve's liquidity custody
    pub liquidity: u64,
    /// Collateral held in the reserve's collateral custody
    pub collateral: u64,
    /// Total supply of the collateral mint
    pub collateral_supply: u64,
}

/// Open an obligation for `owner` in the harness market.
///
/// Initializes the market and reserve first unless they already exist.
pub async fn open_position(harness: &TestHarness, owner: Address) -> Result<OpenPosition> {
    let program = &harness.program;
    let market_key = lending_market_address(&harness.owner);
    let reserve_key = reserve_address(&market_key, &harness.liquidity_mint);

    let market = match program.market(market_key).await? {
        Some(market) => market,
        None => program.init_lending_market(harness.owner).await?,
    };

    let reserve = match program.reserve(reserve_key).await? {
        Some(reserve) => reserve,
        None => program.init_reserve(harness.owner, market.address, harness.liquidity_mint).await?,
    };

    let obligation = match program.obligation(obligation_address(&owner, &reserve.address)).await? {
        Some(obligation) => obligation,
        None => program.init_obligation(owner, market.address, reserve.address).await?,
    };

    Ok(OpenPosition { market, reserve, obligation })
}

/// Read the custody balances backing `reserve`.
pub async fn reserve_balances(harness: &TestHarness, reserve: Address) -> Result<ReserveBalances> {
    let reserve = harness
        .program
        .reserve(reserve)
        .await?
        .with_context(|| format!("reserve {} not initialized", reserve))?;
    let custody = &harness.custody;

    Ok(ReserveBalances {
        liquidity: custody.balance_of(reserve.liquidity_mint, reserve.liquidity_supply).await?,
        collateral: custody.balance_of(reserve.collateral_mint, reserve.collateral_supply).await?,
        collateral_supply: custody.supply_of(reserve.collateral_mint).await?,
    })
}
