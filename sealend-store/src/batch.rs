//! Staged record writes.
//!
//! A transition builds a `RecordBatch` with every record it intends to
//! create or overwrite, plus the events describing the change. Nothing
//! touches the store until [`Store::commit`](crate::Store::commit), which
//! applies the whole batch or none of it.

use std::fmt;

use sealend_domain::{Address, LendingEvent, LendingMarket, Obligation, Reserve};

/// Kind of ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `LendingMarket`
    Market,
    /// `Reserve`
    Reserve,
    /// `Obligation`
    Obligation,
}

impl RecordKind {
    /// Name used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Market => "lending_market",
            RecordKind::Reserve => "reserve",
            RecordKind::Obligation => "obligation",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One staged write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    /// Insert a market; the key must be vacant
    CreateMarket(LendingMarket),
    /// Insert a reserve; the key must be vacant
    CreateReserve(Reserve),
    /// Overwrite an existing reserve
    PutReserve(Reserve),
    /// Insert an obligation; the key must be vacant
    CreateObligation(Obligation),
    /// Overwrite an existing obligation
    PutObligation(Obligation),
}

impl RecordWrite {
    /// Key written
    pub fn key(&self) -> Address {
        match self {
            RecordWrite::CreateMarket(market) => market.address,
            RecordWrite::CreateReserve(reserve) | RecordWrite::PutReserve(reserve) => {
                reserve.address
            },
            RecordWrite::CreateObligation(obligation) | RecordWrite::PutObligation(obligation) => {
                obligation.address
            },
        }
    }

    /// Kind of record written
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordWrite::CreateMarket(_) => RecordKind::Market,
            RecordWrite::CreateReserve(_) | RecordWrite::PutReserve(_) => RecordKind::Reserve,
            RecordWrite::CreateObligation(_) | RecordWrite::PutObligation(_) => {
                RecordKind::Obligation
            },
        }
    }

    /// Whether the key must be vacant (create) or occupied (put)
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            RecordWrite::CreateMarket(_)
                | RecordWrite::CreateReserve(_)
                | RecordWrite::CreateObligation(_)
        )
    }
}

/// Ordered set of staged writes and events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    writes: Vec<RecordWrite>,
    events: Vec<LendingEvent>,
}

impl RecordBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a new market
    pub fn create_market(&mut self, market: LendingMarket) -> &mut Self {
        self.writes.push(RecordWrite::CreateMarket(market));
        self
    }

    /// Stage a new reserve
    pub fn create_reserve(&mut self, reserve: Reserve) -> &mut Self {
        self.writes.push(RecordWrite::CreateReserve(reserve));
        self
    }

    /// Stage an updated reserve
    pub fn put_reserve(&mut self, reserve: Reserve) -> &mut Self {
        self.writes.push(RecordWrite::PutReserve(reserve));
        self
    }

    /// Stage a new obligation
    pub fn create_obligation(&mut self, obligation: Obligation) -> &mut Self {
        self.writes.push(RecordWrite::CreateObligation(obligation));
        self
    }

    /// Stage an updated obligation
    pub fn put_obligation(&mut self, obligation: Obligation) -> &mut Self {
        self.writes.push(RecordWrite::PutObligation(obligation));
        self
    }

    /// Stage an event to append on commit
    pub fn emit(&mut self, event: LendingEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    /// Staged writes in order
    pub fn writes(&self) -> &[RecordWrite] {
        &self.writes
    }

    /// Staged events in order
    pub fn events(&self) -> &[LendingEvent] {
        &self.events
    }

    /// Keys touched by the batch
    pub fn keys(&self) -> Vec<Address> {
        self.writes.iter().map(RecordWrite::key).collect()
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.events.is_empty()
    }

    /// Split into writes and events
    pub fn into_parts(self) -> (Vec<RecordWrite>, Vec<LendingEvent>) {
        (self.writes, self.events)
    }
}
