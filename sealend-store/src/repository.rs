//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the ledger records.
//! Every record lives at its derived address; `create` refuses an occupied
//! key, `get` refuses a vacant one, `put` overwrites an existing record.

use crate::batch::RecordBatch;
use crate::error::StoreError;
use crate::locks::RecordLocks;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sealend_domain::{Address, LendingEvent, LendingMarket, Obligation, Reserve};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Repository for LendingMarket records
#[async_trait]
pub trait MarketRepository: Send + Sync {
    /// Insert a market; fails with `Duplicate` if the key is occupied
    async fn create(&self, market: &LendingMarket) -> Result<(), StoreError>;

    /// Load a market; fails with `NotFound` if absent
    async fn get(&self, address: Address) -> Result<LendingMarket, StoreError>;

    /// Load a market if present
    async fn find(&self, address: Address) -> Result<Option<LendingMarket>, StoreError>;
}

/// Repository for Reserve records
#[async_trait]
pub trait ReserveRepository: Send + Sync {
    /// Insert a reserve; fails with `Duplicate` if the key is occupied
    async fn create(&self, reserve: &Reserve) -> Result<(), StoreError>;

    /// Load a reserve; fails with `NotFound` if absent
    async fn get(&self, address: Address) -> Result<Reserve, StoreError>;

    /// Load a reserve if present
    async fn find(&self, address: Address) -> Result<Option<Reserve>, StoreError>;

    /// Overwrite an existing reserve; fails with `NotFound` if absent
    async fn put(&self, reserve: &Reserve) -> Result<(), StoreError>;

    /// All reserves of a market
    async fn find_by_market(&self, market: Address) -> Result<Vec<Reserve>, StoreError>;
}

/// Repository for Obligation records
#[async_trait]
pub trait ObligationRepository: Send + Sync {
    /// Insert an obligation; fails with `Duplicate` if the key is occupied
    async fn create(&self, obligation: &Obligation) -> Result<(), StoreError>;

    /// Load an obligation; fails with `NotFound` if absent
    async fn get(&self, address: Address) -> Result<Obligation, StoreError>;

    /// Load an obligation if present
    async fn find(&self, address: Address) -> Result<Option<Obligation>, StoreError>;

    /// Overwrite an existing obligation; fails with `NotFound` if absent
    async fn put(&self, obligation: &Obligation) -> Result<(), StoreError>;

    /// All obligations against a reserve
    async fn find_by_reserve(&self, reserve: Address) -> Result<Vec<Obligation>, StoreError>;
}

/// Lending event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Monotonic sequence number, starting at 1
    pub seq: i64,
    /// Unique event identifier (v7, time-ordered)
    pub id: Uuid,
    /// When the event was appended
    pub recorded_at: DateTime<Utc>,
    /// The event itself
    pub event: LendingEvent,
}

/// Repository for lending events (append-only)
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append an event to the log, returning its sequence number
    async fn append(&self, event: &LendingEvent) -> Result<i64, StoreError>;

    /// Events whose subject is `subject`, in order
    async fn find_by_subject(&self, subject: Address) -> Result<Vec<StoredEvent>, StoreError>;

    /// Events touching `reserve`, in order
    async fn find_by_reserve(&self, reserve: Address) -> Result<Vec<StoredEvent>, StoreError>;

    /// Latest sequence number, `None` for an empty log
    async fn get_latest_seq(&self) -> Result<Option<i64>, StoreError>;
}

/// Combined store interface
#[async_trait]
pub trait Store: Send + Sync {
    /// Get market repository
    fn markets(&self) -> &dyn MarketRepository;

    /// Get reserve repository
    fn reserves(&self) -> &dyn ReserveRepository;

    /// Get obligation repository
    fn obligations(&self) -> &dyn ObligationRepository;

    /// Get event repository
    fn events(&self) -> &dyn EventRepository;

    /// Per-record locks for in-flight transitions
    fn locks(&self) -> &RecordLocks;

    /// Check that `batch` would commit, without writing anything
    async fn prepare(&self, batch: &RecordBatch) -> Result<(), StoreError>;

    /// Apply every write and event in `batch`, or none of them
    async fn commit(&self, batch: RecordBatch) -> Result<(), StoreError>;
}
