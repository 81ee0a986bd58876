//! Engine error types.

use sealend_domain::{Address, DomainError};
use thiserror::Error;

/// Errors produced while planning a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Reserve has no collateral outstanding, so it has no exchange rate
    #[error("Reserve {0} is empty")]
    EmptyReserve(Address),

    /// Conversion would divide by zero or overflow u64
    #[error("Division by zero or overflow: {0}")]
    DivisionByZero(String),

    /// Solvency guard
    #[error("Insufficient collateral: requested {requested}, allowed {allowed}")]
    InsufficientCollateral {
        /// Amount the caller asked for
        requested: u64,
        /// Largest amount the obligation can support
        allowed: u64,
    },

    /// Amount is zero, or converts to zero on the other side of the rate
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Obligation has no outstanding debt
    #[error("Obligation {0} has no outstanding debt")]
    NoDebt(Address),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
