//! Custody port definition.
//!
//! The token-transfer primitive is an external collaborator. The program
//! only sees this trait; adapters implement it for a concrete token ledger
//! (the in-memory stub, or a real chain token program).

use async_trait::async_trait;
use sealend_domain::Address;
use serde::{Deserialize, Serialize};

use crate::error::ExecError;

// =============================================================================
// Custody Operations
// =============================================================================

/// One custody primitive, as staged by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CustodyOp {
    /// Register a protocol-controlled mint
    CreateMint {
        /// Mint address
        mint: Address,
        /// Who may mint and burn
        authority: Address,
        /// Token decimals
        decimals: u8,
    },

    /// Open a custody account for `asset`
    OpenAccount {
        /// Asset held by the account
        asset: Address,
        /// Account address
        account: Address,
        /// Who may move funds out
        authority: Address,
    },

    /// Remove an empty protocol mint
    CloseMint {
        /// Mint address
        mint: Address,
        /// Authority recorded at creation
        authority: Address,
        /// Decimals recorded at creation
        decimals: u8,
    },

    /// Close an empty custody account
    CloseAccount {
        /// Asset held by the account
        asset: Address,
        /// Account address
        account: Address,
        /// Authority recorded at opening
        authority: Address,
    },

    /// Move `amount` from a holder into custody
    TransferIn {
        /// Asset moved
        asset: Address,
        /// Debited holder
        holder: Address,
        /// Credited custody account
        custody: Address,
        /// Amount moved
        amount: u64,
    },

    /// Move `amount` out of custody to a recipient
    TransferOut {
        /// Asset moved
        asset: Address,
        /// Debited custody account
        custody: Address,
        /// Credited recipient
        recipient: Address,
        /// Amount moved
        amount: u64,
    },

    /// Increase supply of a protocol mint
    Mint {
        /// Mint
        asset: Address,
        /// Credited account
        recipient: Address,
        /// Amount minted
        amount: u64,
    },

    /// Decrease supply of a protocol mint
    Burn {
        /// Mint
        asset: Address,
        /// Debited account
        holder: Address,
        /// Amount burned
        amount: u64,
    },
}

impl CustodyOp {
    /// Operation that undoes this one.
    ///
    /// Closing carries the creation metadata, so every operation has an
    /// inverse and `op.inverse().inverse() == op`.
    pub fn inverse(&self) -> CustodyOp {
        match *self {
            CustodyOp::CreateMint { mint, authority, decimals } => {
                CustodyOp::CloseMint { mint, authority, decimals }
            },
            CustodyOp::CloseMint { mint, authority, decimals } => {
                CustodyOp::CreateMint { mint, authority, decimals }
            },
            CustodyOp::OpenAccount { asset, account, authority } => {
                CustodyOp::CloseAccount { asset, account, authority }
            },
            CustodyOp::CloseAccount { asset, account, authority } => {
                CustodyOp::OpenAccount { asset, account, authority }
            },
            CustodyOp::TransferIn { asset, holder, custody, amount } => {
                CustodyOp::TransferOut { asset, custody, recipient: holder, amount }
            },
            CustodyOp::TransferOut { asset, custody, recipient, amount } => {
                CustodyOp::TransferIn { asset, holder: recipient, custody, amount }
            },
            CustodyOp::Mint { asset, recipient, amount } => {
                CustodyOp::Burn { asset, holder: recipient, amount }
            },
            CustodyOp::Burn { asset, holder, amount } => {
                CustodyOp::Mint { asset, recipient: holder, amount }
            },
        }
    }

    /// Operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CustodyOp::CreateMint { .. } => "create_mint",
            CustodyOp::OpenAccount { .. } => "open_account",
            CustodyOp::CloseMint { .. } => "close_mint",
            CustodyOp::CloseAccount { .. } => "close_account",
            CustodyOp::TransferIn { .. } => "transfer_in",
            CustodyOp::TransferOut { .. } => "transfer_out",
            CustodyOp::Mint { .. } => "mint",
            CustodyOp::Burn { .. } => "burn",
        }
    }
}

// =============================================================================
// Custody Port
// =============================================================================

/// Port for token custody.
///
/// Every method is atomic: the full amount moves or nothing does.
/// `settle` extends that guarantee to a whole batch.
///
/// Implementations:
/// - `StubCustody` - in-memory token ledger for tests and the simulator
#[async_trait]
pub trait CustodyPort: Send + Sync {
    /// Move `amount` of `asset` from `holder` into `custody`.
    ///
    /// Fails with `InsufficientFunds` if `holder` lacks `amount`.
    async fn transfer_in(
        &self,
        asset: Address,
        holder: Address,
        custody: Address,
        amount: u64,
    ) -> Result<(), ExecError> {
        self.settle(&[CustodyOp::TransferIn { asset, holder, custody, amount }]).await
    }

    /// Move `amount` of `asset` from `custody` to `recipient`.
    ///
    /// Fails with `InsufficientFunds` if `custody` lacks `amount`.
    async fn transfer_out(
        &self,
        asset: Address,
        custody: Address,
        recipient: Address,
        amount: u64,
    ) -> Result<(), ExecError> {
        self.settle(&[CustodyOp::TransferOut { asset, custody, recipient, amount }]).await
    }

    /// Mint `amount` of the protocol-controlled `asset` to `recipient`.
    async fn mint(&self, asset: Address, recipient: Address, amount: u64) -> Result<(), ExecError> {
        self.settle(&[CustodyOp::Mint { asset, recipient, amount }]).await
    }

    /// Burn `amount` of the protocol-controlled `asset` held by `holder`.
    ///
    /// Fails with `InsufficientFunds` if `holder` lacks `amount`.
    async fn burn(&self, asset: Address, holder: Address, amount: u64) -> Result<(), ExecError> {
        self.settle(&[CustodyOp::Burn { asset, holder, amount }]).await
    }

    /// Apply every operation in order, or none of them.
    async fn settle(&self, ops: &[CustodyOp]) -> Result<(), ExecError>;

    /// Balance of `asset` held by `holder`
    async fn balance_of(&self, asset: Address, holder: Address) -> Result<u64, ExecError>;

    /// Total supply of `asset`
    async fn supply_of(&self, asset: Address) -> Result<u64, ExecError>;
}

// =============================================================================
// Tests
// =============================================================================
