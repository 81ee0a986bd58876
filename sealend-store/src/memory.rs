//! In-memory store implementation
//!
//! Used for testing and the scenario runner.
//! All tables sit behind one RwLock so a batch commit is a single write
//! critical section; per-record transition locking lives in `RecordLocks`.

use crate::batch::{RecordBatch, RecordKind, RecordWrite};
use crate::error::StoreError;
use crate::locks::RecordLocks;
use crate::repository::{
    EventRepository, MarketRepository, ObligationRepository, ReserveRepository, Store,
    StoredEvent,
};
use async_trait::async_trait;
use chrono::Utc;
use sealend_domain::{Address, LendingEvent, LendingMarket, Obligation, Reserve};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

/// In-memory ledger
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: RecordLocks,
}

#[derive(Default)]
struct Tables {
    markets: HashMap<Address, LendingMarket>,
    reserves: HashMap<Address, Reserve>,
    obligations: HashMap<Address, Obligation>,
    events: Vec<StoredEvent>,
}

impl Tables {
    fn contains(&self, kind: RecordKind, key: &Address) -> bool {
        match kind {
            RecordKind::Market => self.markets.contains_key(key),
            RecordKind::Reserve => self.reserves.contains_key(key),
            RecordKind::Obligation => self.obligations.contains_key(key),
        }
    }

    /// Check every write against current contents and earlier writes in the batch
    fn validate(&self, writes: &[RecordWrite]) -> Result<(), StoreError> {
        let mut created: HashSet<(RecordKind, Address)> = HashSet::new();

        for write in writes {
            let kind = write.kind();
            let key = write.key();
            let exists = self.contains(kind, &key) || created.contains(&(kind, key));

            if write.is_create() {
                if exists {
                    return Err(StoreError::duplicate(kind.as_str(), key));
                }
                created.insert((kind, key));
            } else if !exists {
                return Err(StoreError::not_found(kind.as_str(), key));
            }
        }

        Ok(())
    }

    fn apply(&mut self, write: RecordWrite) {
        match write {
            RecordWrite::CreateMarket(market) => {
                self.markets.insert(market.address, market);
            },
            RecordWrite::CreateReserve(reserve) | RecordWrite::PutReserve(reserve) => {
                self.reserves.insert(reserve.address, reserve);
            },
            RecordWrite::CreateObligation(obligation) | RecordWrite::PutObligation(obligation) => {
                self.obligations.insert(obligation.address, obligation);
            },
        }
    }

    fn append(&mut self, event: LendingEvent) -> i64 {
        let seq = self.events.len() as i64 + 1;
        self.events.push(StoredEvent {
            seq,
            id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            event,
        });
        seq
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: RecordLocks::new(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn commit_writes(&self, writes: Vec<RecordWrite>) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.validate(&writes)?;
        for write in writes {
            tables.apply(write);
        }
        Ok(())
    }

    /// Get the number of markets
    pub fn market_count(&self) -> usize {
        self.read().map(|t| t.markets.len()).unwrap_or(0)
    }

    /// Get the number of reserves
    pub fn reserve_count(&self) -> usize {
        self.read().map(|t| t.reserves.len()).unwrap_or(0)
    }

    /// Get the number of obligations
    pub fn obligation_count(&self) -> usize {
        self.read().map(|t| t.obligations.len()).unwrap_or(0)
    }

    /// Get the number of events
    pub fn event_count(&self) -> usize {
        self.read().map(|t| t.events.len()).unwrap_or(0)
    }

    /// Dump every record and event as JSON (sorted by address for stable output)
    pub fn export_json(&self) -> Result<serde_json::Value, StoreError> {
        let tables = self.read()?;

        let mut markets: Vec<&LendingMarket> = tables.markets.values().collect();
        markets.sort_by_key(|m| m.address);
        let mut reserves: Vec<&Reserve> = tables.reserves.values().collect();
        reserves.sort_by_key(|r| r.address);
        let mut obligations: Vec<&Obligation> = tables.obligations.values().collect();
        obligations.sort_by_key(|o| o.address);

        Ok(serde_json::json!({
            "markets": serde_json::to_value(markets)?,
            "reserves": serde_json::to_value(reserves)?,
            "obligations": serde_json::to_value(obligations)?,
            "events": serde_json::to_value(&tables.events)?,
        }))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Market Repository Implementation
// =============================================================================

#[async_trait]
impl MarketRepository for MemoryStore {
    async fn create(&self, market: &LendingMarket) -> Result<(), StoreError> {
        self.commit_writes(vec![RecordWrite::CreateMarket(market.clone())])
    }

    async fn get(&self, address: Address) -> Result<LendingMarket, StoreError> {
        MarketRepository::find(self, address)
            .await?
            .ok_or_else(|| StoreError::not_found(RecordKind::Market.as_str(), address))
    }

    async fn find(&self, address: Address) -> Result<Option<LendingMarket>, StoreError> {
        Ok(self.read()?.markets.get(&address).cloned())
    }
}

// =============================================================================
// Reserve Repository Implementation
// =============================================================================

#[async_trait]
impl ReserveRepository for MemoryStore {
    async fn create(&self, reserve: &Reserve) -> Result<(), StoreError> {
        self.commit_writes(vec![RecordWrite::CreateReserve(reserve.clone())])
    }

    async fn get(&self, address: Address) -> Result<Reserve, StoreError> {
        ReserveRepository::find(self, address)
            .await?
            .ok_or_else(|| StoreError::not_found(RecordKind::Reserve.as_str(), address))
    }

    async fn find(&self, address: Address) -> Result<Option<Reserve>, StoreError> {
        Ok(self.read()?.reserves.get(&address).cloned())
    }

    async fn put(&self, reserve: &Reserve) -> Result<(), StoreError> {
        self.commit_writes(vec![RecordWrite::PutReserve(reserve.clone())])
    }

    async fn find_by_market(&self, market: Address) -> Result<Vec<Reserve>, StoreError> {
        let tables = self.read()?;
        Ok(tables.reserves.values().filter(|r| r.lending_market == market).cloned().collect())
    }
}

// =============================================================================
// Obligation Repository Implementation
// =============================================================================

#[async_trait]
impl ObligationRepository for MemoryStore {
    async fn create(&self, obligation: &Obligation) -> Result<(), StoreError> {
        self.commit_writes(vec![RecordWrite::CreateObligation(obligation.clone())])
    }

    async fn get(&self, address: Address) -> Result<Obligation, StoreError> {
        ObligationRepository::find(self, address)
            .await?
            .ok_or_else(|| StoreError::not_found(RecordKind::Obligation.as_str(), address))
    }

    async fn find(&self, address: Address) -> Result<Option<Obligation>, StoreError> {
        Ok(self.read()?.obligations.get(&address).cloned())
    }

    async fn put(&self, obligation: &Obligation) -> Result<(), StoreError> {
        self.commit_writes(vec![RecordWrite::PutObligation(obligation.clone())])
    }

    async fn find_by_reserve(&self, reserve: Address) -> Result<Vec<Obligation>, StoreError> {
        let tables = self.read()?;
        Ok(tables.obligations.values().filter(|o| o.reserve == reserve).cloned().collect())
    }
}

// =============================================================================
// Event Repository Implementation
// =============================================================================

#[async_trait]
impl EventRepository for MemoryStore {
    async fn append(&self, event: &LendingEvent) -> Result<i64, StoreError> {
        Ok(self.write()?.append(event.clone()))
    }

    async fn find_by_subject(&self, subject: Address) -> Result<Vec<StoredEvent>, StoreError> {
        let tables = self.read()?;
        Ok(tables.events.iter().filter(|e| e.event.subject() == subject).cloned().collect())
    }

    async fn find_by_reserve(&self, reserve: Address) -> Result<Vec<StoredEvent>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.event.reserve() == Some(reserve))
            .cloned()
            .collect())
    }

    async fn get_latest_seq(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.read()?.events.last().map(|e| e.seq))
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for MemoryStore {
    fn markets(&self) -> &dyn MarketRepository {
        self
    }

    fn reserves(&self) -> &dyn ReserveRepository {
        self
    }

    fn obligations(&self) -> &dyn ObligationRepository {
        self
    }

    fn events(&self) -> &dyn EventRepository {
        self
    }

    fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    async fn prepare(&self, batch: &RecordBatch) -> Result<(), StoreError> {
        self.read()?.validate(batch.writes())
    }

    async fn commit(&self, batch: RecordBatch) -> Result<(), StoreError> {
        let (writes, events) = batch.into_parts();
        let write_count = writes.len();
        let event_count = events.len();

        let mut tables = self.write()?;
        tables.validate(&writes)?;
        for write in writes {
            tables.apply(write);
        }
        for event in events {
            tables.append(event);
        }

        debug!(writes = write_count, events = event_count, "Record batch committed");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
