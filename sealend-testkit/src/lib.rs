//! Test helpers for Sea Lending integration tests.
//!
//! Provides a wired-up program over in-memory custody and storage, plus
//! seeding helpers for funded wallets and open positions.

mod helpers;

pub use helpers::{OpenPosition, ReserveBalances, open_position, reserve_balances};

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use sealend_domain::{Address, LoanToValue, ProtocolParams};
use sealend_exec::{LendingProgram, StubCustody};
use sealend_store::MemoryStore;

/// Liquidity balance every harness owner starts with
pub const DEFAULT_BALANCE: u64 = 1_000_000;

/// Program wired to a fresh stub custody and memory store.
pub struct TestHarness {
    /// The program under test
    pub program: LendingProgram<StubCustody, MemoryStore>,
    /// Custody shared with the program
    pub custody: Arc<StubCustody>,
    /// Store shared with the program
    pub store: Arc<MemoryStore>,
    /// Market owner, funded with `DEFAULT_BALANCE`
    pub owner: Address,
    /// External liquidity mint
    pub liquidity_mint: Address,
}

impl TestHarness {
    /// Harness with default protocol parameters
    pub fn new() -> Result<Self> {
        Self::with_params(ProtocolParams::default())
    }

    /// Harness with a custom loan-to-value ratio
    pub fn with_ltv(ratio: Decimal) -> Result<Self> {
        Self::with_params(ProtocolParams::new(LoanToValue::new(ratio)?, 6)?)
    }

    /// Harness with explicit protocol parameters
    pub fn with_params(params: ProtocolParams) -> Result<Self> {
        let custody = Arc::new(StubCustody::new());
        let store = Arc::new(MemoryStore::new());
        let owner = Address::from_label("owner");
        let liquidity_mint = Address::from_label("liquidity-mint");

        custody.create_external_mint(liquidity_mint, 6)?;
        custody.airdrop(liquidity_mint, owner, DEFAULT_BALANCE)?;

        let program = LendingProgram::new(custody.clone(), store.clone(), params);
        Ok(Self { program, custody, store, owner, liquidity_mint })
    }

    /// Create and fund another wallet
    pub fn wallet(&self, label: &str, balance: u64) -> Result<Address> {
        let wallet = Address::from_label(label);
        if balance > 0 {
            self.custody.airdrop(self.liquidity_mint, wallet, balance)?;
        }
        Ok(wallet)
    }
}
