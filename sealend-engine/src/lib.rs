//! Sea Lending Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes records + amount → returns the staged records to commit.
//!
//! # Modules
//!
//! - **exchange**: liquidity ↔ collateral conversion at the reserve's rate
//! - **obligation**: collateral valuation and solvency checks
//! - **engine**: per-operation planning on top of the two above

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod exchange;
pub mod obligation;

pub use engine::{Engine, Overpayment, Transition};
pub use error::{EngineError, EngineResult};
pub use exchange::{collateral_to_liquidity, exchange_rate, liquidity_to_collateral};
pub use obligation::{
    apply_borrow, apply_repay, can_borrow, can_withdraw, collateral_value, max_borrowable,
    RepayPlan,
};
