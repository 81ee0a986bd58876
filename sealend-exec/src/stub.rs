//! Stub custody for testing.
//!
//! An in-memory token ledger. Batches are applied to a scratch copy of the
//! ledger and swapped in only if every operation succeeds.

use async_trait::async_trait;
use sealend_domain::Address;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::error::ExecError;
use crate::ports::{CustodyOp, CustodyPort};

/// Mint metadata
#[derive(Debug, Clone)]
struct MintInfo {
    authority: Option<Address>,
    decimals: u8,
    supply: u64,
}

/// Custody account metadata
#[derive(Debug, Clone)]
struct AccountInfo {
    asset: Address,
    authority: Address,
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    mints: HashMap<Address, MintInfo>,
    accounts: HashMap<Address, AccountInfo>,
    balances: HashMap<(Address, Address), u64>,
}

impl Ledger {
    fn balance(&self, asset: Address, holder: Address) -> u64 {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    fn require_mint(&self, asset: Address) -> Result<&MintInfo, ExecError> {
        self.mints
            .get(&asset)
            .ok_or_else(|| ExecError::Custody(format!("unknown mint {}", asset)))
    }

    /// Custody accounts only hold their own asset
    fn check_account_asset(&self, account: Address, asset: Address) -> Result<(), ExecError> {
        match self.accounts.get(&account) {
            Some(info) if info.asset != asset => Err(ExecError::Custody(format!(
                "account {} holds {}, not {}",
                account, info.asset, asset
            ))),
            _ => Ok(()),
        }
    }

    fn debit(&mut self, asset: Address, holder: Address, amount: u64) -> Result<(), ExecError> {
        let available = self.balance(asset, holder);
        if available < amount {
            return Err(ExecError::InsufficientFunds {
                asset,
                holder,
                required: amount,
                available,
            });
        }
        self.balances.insert((asset, holder), available - amount);
        Ok(())
    }

    fn credit(&mut self, asset: Address, holder: Address, amount: u64) -> Result<(), ExecError> {
        let balance = self
            .balance(asset, holder)
            .checked_add(amount)
            .ok_or_else(|| ExecError::Custody(format!("balance overflow for {}", holder)))?;
        self.balances.insert((asset, holder), balance);
        Ok(())
    }

    fn apply(&mut self, op: &CustodyOp) -> Result<(), ExecError> {
        match *op {
            CustodyOp::CreateMint { mint, authority, decimals } => {
                if self.mints.contains_key(&mint) {
                    return Err(ExecError::already_exists("mint", mint));
                }
                self.mints.insert(
                    mint,
                    MintInfo { authority: Some(authority), decimals, supply: 0 },
                );
            },
            CustodyOp::OpenAccount { asset, account, authority } => {
                self.require_mint(asset)?;
                if self.accounts.contains_key(&account) {
                    return Err(ExecError::already_exists("custody_account", account));
                }
                self.accounts.insert(account, AccountInfo { asset, authority });
            },
            CustodyOp::CloseMint { mint, authority, .. } => {
                let info = self.require_mint(mint)?;
                if info.authority != Some(authority) {
                    return Err(ExecError::Custody(format!(
                        "mint {} not controlled by {}",
                        mint, authority
                    )));
                }
                if info.supply > 0 {
                    return Err(ExecError::Custody(format!(
                        "mint {} has supply {}",
                        mint, info.supply
                    )));
                }
                if self.accounts.values().any(|a| a.asset == mint) {
                    return Err(ExecError::Custody(format!("mint {} has open accounts", mint)));
                }
                self.mints.remove(&mint);
            },
            CustodyOp::CloseAccount { asset, account, authority } => {
                match self.accounts.get(&account) {
                    Some(info) if info.asset == asset && info.authority == authority => {},
                    _ => {
                        return Err(ExecError::Custody(format!(
                            "no {} account {} under {}",
                            asset, account, authority
                        )))
                    },
                }
                let balance = self.balance(asset, account);
                if balance > 0 {
                    return Err(ExecError::Custody(format!("account {} holds {}", account, balance)));
                }
                self.accounts.remove(&account);
                self.balances.remove(&(asset, account));
            },
            CustodyOp::TransferIn { asset, holder, custody, amount } => {
                self.check_account_asset(custody, asset)?;
                self.debit(asset, holder, amount)?;
                self.credit(asset, custody, amount)?;
            },
            CustodyOp::TransferOut { asset, custody, recipient, amount } => {
                self.check_account_asset(custody, asset)?;
                self.debit(asset, custody, amount)?;
                self.credit(asset, recipient, amount)?;
            },
            CustodyOp::Mint { asset, recipient, amount } => {
                let supply = self
                    .require_mint(asset)?
                    .supply
                    .checked_add(amount)
                    .ok_or_else(|| ExecError::Custody(format!("supply overflow for {}", asset)))?;
                self.credit(asset, recipient, amount)?;
                if let Some(mint) = self.mints.get_mut(&asset) {
                    mint.supply = supply;
                }
            },
            CustodyOp::Burn { asset, holder, amount } => {
                self.require_mint(asset)?;
                self.debit(asset, holder, amount)?;
                if let Some(mint) = self.mints.get_mut(&asset) {
                    mint.supply = mint.supply.saturating_sub(amount);
                }
            },
        }
        Ok(())
    }
}

// =============================================================================
// Stub Custody
// =============================================================================

/// Stub custody for testing.
///
/// Supports external mints with a faucet (`airdrop`) and failure injection.
pub struct StubCustody {
    ledger: RwLock<Ledger>,
    /// Whether to simulate a failure on the next settle
    fail_next: RwLock<bool>,
}

impl StubCustody {
    /// Create an empty custody ledger
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            fail_next: RwLock::new(false),
        }
    }

    /// Register a mint created outside the protocol (e.g. the liquidity asset).
    pub fn create_external_mint(&self, mint: Address, decimals: u8) -> Result<(), ExecError> {
        let mut ledger = self.write()?;
        if ledger.mints.contains_key(&mint) {
            return Err(ExecError::already_exists("mint", mint));
        }
        ledger.mints.insert(mint, MintInfo { authority: None, decimals, supply: 0 });
        Ok(())
    }

    /// Faucet: mint `amount` of an external `mint` to `holder`.
    pub fn airdrop(&self, mint: Address, holder: Address, amount: u64) -> Result<(), ExecError> {
        let mut ledger = self.write()?;
        let mut scratch = ledger.clone();
        scratch.apply(&CustodyOp::Mint { asset: mint, recipient: holder, amount })?;
        *ledger = scratch;
        Ok(())
    }

    /// Decimals of a registered mint
    pub fn decimals_of(&self, mint: Address) -> Result<u8, ExecError> {
        Ok(self.read()?.require_mint(mint)?.decimals)
    }

    /// Authority of a protocol mint (`None` for external mints)
    pub fn mint_authority(&self, mint: Address) -> Result<Option<Address>, ExecError> {
        Ok(self.read()?.require_mint(mint)?.authority)
    }

    /// Authority of a custody account
    pub fn account_authority(&self, account: Address) -> Result<Option<Address>, ExecError> {
        Ok(self.read()?.accounts.get(&account).map(|a| a.authority))
    }

    /// Configure the next settle to fail.
    pub fn set_fail_next(&self, fail: bool) {
        if let Ok(mut fail_next) = self.fail_next.write() {
            *fail_next = fail;
        }
    }

    /// Check if we should fail the next operation.
    fn should_fail(&self) -> bool {
        match self.fail_next.write() {
            Ok(mut fail_next) => std::mem::replace(&mut *fail_next, false),
            Err(_) => false,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Ledger>, ExecError> {
        self.ledger.read().map_err(|e| ExecError::Custody(format!("ledger poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Ledger>, ExecError> {
        self.ledger.write().map_err(|e| ExecError::Custody(format!("ledger poisoned: {}", e)))
    }
}

impl Default for StubCustody {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustodyPort for StubCustody {
    async fn settle(&self, ops: &[CustodyOp]) -> Result<(), ExecError> {
        if self.should_fail() {
            return Err(ExecError::Custody("Simulated custody failure".to_string()));
        }

        let mut ledger = self.write()?;
        let mut scratch = ledger.clone();
        for op in ops {
            scratch.apply(op)?;
        }
        *ledger = scratch;

        debug!(ops = ops.len(), "Stub: custody batch settled");
        Ok(())
    }

    async fn balance_of(&self, asset: Address, holder: Address) -> Result<u64, ExecError> {
        Ok(self.read()?.balance(asset, holder))
    }

    async fn supply_of(&self, asset: Address) -> Result<u64, ExecError> {
        Ok(self.read()?.require_mint(asset)?.supply)
    }
}

// =============================================================================
// Tests
// =============================================================================
