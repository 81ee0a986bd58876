//! Simulator error types.

use sealend_domain::DomainError;
use sealend_exec::ExecError;
use sealend_store::StoreError;
use thiserror::Error;

/// Simulator-level errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
