//! Sea Lending Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the ledger records, addressing, value objects, and events.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod address;
pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use address::{
    collateral_mint_address, collateral_supply_address, derive_address, lending_market_address,
    liquidity_supply_address, obligation_address, reserve_address, DomainTag,
};
pub use entities::{LendingMarket, Obligation, Reserve};
pub use events::LendingEvent;
pub use value_objects::{Address, DomainError, LoanToValue, ProtocolParams};
