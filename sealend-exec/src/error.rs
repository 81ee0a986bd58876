//! Execution layer error types.
//!
//! `ExecError` is what callers of the lending program see. Engine and store
//! failures are folded into the named protocol kinds so that, for example, a
//! store `Duplicate` surfaces as `AlreadyExists`.

use sealend_domain::{Address, DomainError};
use sealend_engine::EngineError;
use sealend_store::StoreError;
use thiserror::Error;

/// Errors that can occur during a lending operation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Creation target already exists
    #[error("Already exists: {entity_type} at {id}")]
    AlreadyExists {
        /// Kind of record or custody object
        entity_type: String,
        /// Address
        id: String,
    },

    /// Referenced record does not exist
    #[error("Not found: {entity_type} at {id}")]
    NotFound {
        /// Kind of record
        entity_type: String,
        /// Address
        id: String,
    },

    /// Lending market does not exist
    #[error("Lending market not found: {0}")]
    MarketNotFound(Address),

    /// Reserve does not exist
    #[error("Reserve not found: {0}")]
    ReserveNotFound(Address),

    /// Token balance too low for a transfer or burn
    #[error("Insufficient funds: {holder} holds {available} of {asset}, needs {required}")]
    InsufficientFunds {
        /// Asset being moved
        asset: Address,
        /// Account being debited
        holder: Address,
        /// Amount needed
        required: u64,
        /// Amount held
        available: u64,
    },

    /// Solvency guard on borrow or withdraw
    #[error("Insufficient collateral: requested {requested}, allowed {allowed}")]
    InsufficientCollateral {
        /// Amount the caller asked for
        requested: u64,
        /// Largest amount the obligation supports
        allowed: u64,
    },

    /// Reserve has no collateral outstanding
    #[error("Reserve is empty: {0}")]
    EmptyReserve(Address),

    /// Conversion divided by zero or overflowed
    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// Amount is zero or rounds to zero
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Repay against an obligation with no debt
    #[error("No outstanding debt on obligation {0}")]
    NoDebt(Address),

    /// Caller is not the obligation owner
    #[error("Unauthorized: {caller} is not the owner {owner}")]
    Unauthorized {
        /// Caller identity
        caller: Address,
        /// Designated owner
        owner: Address,
    },

    /// Obligation, reserve, and market references disagree
    #[error("Record mismatch: {0}")]
    RecordMismatch(String),

    /// Custody adapter failure other than insufficient funds
    #[error("Custody error: {0}")]
    Custody(String),

    /// Store error with no protocol-level meaning
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Domain error (arithmetic overflow/underflow on running totals)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Stable discriminant of an `ExecError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Record or custody object already present
    AlreadyExists,
    /// Record absent
    NotFound,
    /// Lending market absent
    MarketNotFound,
    /// Reserve absent
    ReserveNotFound,
    /// Holder or custody account short of tokens
    InsufficientFunds,
    /// Borrow or withdraw beyond the loan-to-value limit
    InsufficientCollateral,
    /// Reserve with no liquidity or collateral
    EmptyReserve,
    /// Exchange-rate division by zero
    DivisionByZero,
    /// Zero or otherwise unusable amount
    InvalidAmount,
    /// Repay with nothing outstanding
    NoDebt,
    /// Caller is not the obligation owner
    Unauthorized,
    /// Records reference different markets or reserves
    RecordMismatch,
    /// Custody port failure
    Custody,
    /// Store failure
    Store,
    /// Arithmetic on running totals
    Domain,
}

impl ExecError {
    /// Discriminant for matching without destructuring
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            ExecError::NotFound { .. } => ErrorKind::NotFound,
            ExecError::MarketNotFound(_) => ErrorKind::MarketNotFound,
            ExecError::ReserveNotFound(_) => ErrorKind::ReserveNotFound,
            ExecError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ExecError::InsufficientCollateral { .. } => ErrorKind::InsufficientCollateral,
            ExecError::EmptyReserve(_) => ErrorKind::EmptyReserve,
            ExecError::DivisionByZero(_) => ErrorKind::DivisionByZero,
            ExecError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            ExecError::NoDebt(_) => ErrorKind::NoDebt,
            ExecError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ExecError::RecordMismatch(_) => ErrorKind::RecordMismatch,
            ExecError::Custody(_) => ErrorKind::Custody,
            ExecError::Store(_) => ErrorKind::Store,
            ExecError::Domain(_) => ErrorKind::Domain,
        }
    }

    /// Create an already-exists error
    pub fn already_exists(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for ExecError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { entity_type, id } => ExecError::AlreadyExists { entity_type, id },
            StoreError::NotFound { entity_type, id } => ExecError::NotFound { entity_type, id },
            StoreError::Domain(e) => ExecError::Domain(e),
            other => ExecError::Store(other),
        }
    }
}

impl From<EngineError> for ExecError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::EmptyReserve(reserve) => ExecError::EmptyReserve(reserve),
            EngineError::DivisionByZero(msg) => ExecError::DivisionByZero(msg),
            EngineError::InsufficientCollateral { requested, allowed } => {
                ExecError::InsufficientCollateral { requested, allowed }
            },
            EngineError::InvalidAmount(msg) => ExecError::InvalidAmount(msg),
            EngineError::NoDebt(obligation) => ExecError::NoDebt(obligation),
            EngineError::Domain(e) => ExecError::Domain(e),
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
