//! Sea Lending Execution Layer
//!
//! The protocol state machine and its token custody port.
//!
//! # Architecture
//!
//! ```text
//! Caller → LendingProgram → Engine (plan) → RecordBatch + CustodyOps
//!                         → Store::prepare → CustodyPort::settle → Store::commit
//! ```
//!
//! # Components
//!
//! - **Ports**: the custody trait and its batched primitives
//! - **Program**: the five lending operations, each one atomic transition
//! - **Stub**: in-memory custody for tests and the simulator
//!
//! # Example
//!
//! ```rust,ignore
//! use sealend_exec::{LendingProgram, StubCustody};
//! use sealend_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let custody = Arc::new(StubCustody::new());
//! let store = Arc::new(MemoryStore::new());
//! let program = LendingProgram::new(custody, store, ProtocolParams::default());
//!
//! let market = program.init_lending_market(owner).await?;
//! let reserve = program.init_reserve(owner, market.address, usdc).await?;
//! let obligation = program.init_obligation(owner, market.address, reserve.address).await?;
//! program.supply(owner, obligation.address, 200).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod ports;
pub mod program;
pub mod stub;

// Re-exports for convenience
pub use error::{ErrorKind, ExecError, ExecResult};
pub use ports::{CustodyOp, CustodyPort};
pub use program::{LendingProgram, Receipt};
pub use sealend_engine::Overpayment;
pub use stub::StubCustody;
