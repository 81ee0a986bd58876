//! Sea Lending Ledger Record Store
//!
//! Durable keyed records for markets, reserves, and obligations, plus the
//! append-only audit log of lending events.
//!
//! # Architecture
//!
//! - **Repository traits**: create / get / put per record kind (ports)
//! - **Record batch**: staged writes committed all-or-nothing
//! - **Record locks**: per-key mutual exclusion for in-flight transitions
//! - **In-memory store**: implementation used by tests and the simulator
//!
//! # Usage
//!
//! ```rust
//! use sealend_domain::{Address, LendingMarket};
//! use sealend_store::{MemoryStore, RecordBatch, Store};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let market = LendingMarket::new(Address::from_label("owner"));
//!
//!     let mut batch = RecordBatch::new();
//!     batch.create_market(market.clone());
//!     store.prepare(&batch).await.unwrap();
//!     store.commit(batch).await.unwrap();
//!
//!     let loaded = store.markets().get(market.address).await.unwrap();
//!     assert_eq!(loaded, market);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod batch;
mod error;
mod locks;
mod memory;
mod repository;

// Re-exports
pub use batch::{RecordBatch, RecordKind, RecordWrite};
pub use error::StoreError;
pub use locks::{RecordLockGuard, RecordLocks};
pub use memory::MemoryStore;
pub use repository::{
    EventRepository, MarketRepository, ObligationRepository, ReserveRepository, Store,
    StoredEvent,
};
