//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found
    #[error("Record not found: {entity_type} at {id}")]
    NotFound {
        /// Kind of record (market, reserve, obligation)
        entity_type: String,
        /// Record address
        id: String,
    },

    /// Record already present at the key
    #[error("Record already exists: {entity_type} at {id}")]
    Duplicate {
        /// Kind of record
        entity_type: String,
        /// Record address
        id: String,
    },

    /// Internal lock poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] sealend_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
