//! Domain Events for Sea Lending
//!
//! Events are the audit trail of committed transitions. Each one is written
//! in the same record batch as the state change it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Address;

/// Domain events for the lending lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LendingEvent {
    /// Lending market created
    MarketInitialized {
        /// Market address
        market: Address,
        /// Market owner
        owner: Address,
        /// When the market was created
        timestamp: DateTime<Utc>,
    },

    /// Reserve created with its custody accounts and collateral mint
    ReserveInitialized {
        /// Reserve address
        reserve: Address,
        /// Parent market
        market: Address,
        /// Liquidity asset
        liquidity_mint: Address,
        /// Protocol-minted collateral asset
        collateral_mint: Address,
        /// When the reserve was created
        timestamp: DateTime<Utc>,
    },

    /// Obligation opened
    ObligationInitialized {
        /// Obligation address
        obligation: Address,
        /// Obligation owner
        owner: Address,
        /// Reserve the obligation borrows against
        reserve: Address,
        /// When the obligation was created
        timestamp: DateTime<Utc>,
    },

    /// Liquidity supplied, collateral minted
    Supplied {
        /// Obligation credited
        obligation: Address,
        /// Reserve receiving liquidity
        reserve: Address,
        /// Liquidity moved into custody
        liquidity_amount: u64,
        /// Collateral minted
        collateral_amount: u64,
        /// When the supply committed
        timestamp: DateTime<Utc>,
    },

    /// Liquidity borrowed out of custody
    Borrowed {
        /// Obligation charged
        obligation: Address,
        /// Reserve lending
        reserve: Address,
        /// Liquidity moved to the borrower
        liquidity_amount: u64,
        /// When the borrow committed
        timestamp: DateTime<Utc>,
    },

    /// Debt repaid
    Repaid {
        /// Obligation credited
        obligation: Address,
        /// Reserve receiving liquidity
        reserve: Address,
        /// Liquidity moved into custody
        liquidity_amount: u64,
        /// When the repay committed
        timestamp: DateTime<Utc>,
    },

    /// Repay request exceeded the outstanding debt and was reduced
    OverpaymentClamped {
        /// Obligation repaid
        obligation: Address,
        /// Amount the caller asked to repay
        requested: u64,
        /// Amount actually transferred
        repaid: u64,
        /// When the repay committed
        timestamp: DateTime<Utc>,
    },

    /// Collateral burned, liquidity returned
    Withdrawn {
        /// Obligation debited
        obligation: Address,
        /// Reserve paying out
        reserve: Address,
        /// Collateral burned
        collateral_amount: u64,
        /// Liquidity moved to the owner
        liquidity_amount: u64,
        /// When the withdraw committed
        timestamp: DateTime<Utc>,
    },
}

impl LendingEvent {
    /// Address of the record this event is about
    pub fn subject(&self) -> Address {
        match self {
            LendingEvent::MarketInitialized { market, .. } => *market,
            LendingEvent::ReserveInitialized { reserve, .. } => *reserve,
            LendingEvent::ObligationInitialized { obligation, .. }
            | LendingEvent::Supplied { obligation, .. }
            | LendingEvent::Borrowed { obligation, .. }
            | LendingEvent::Repaid { obligation, .. }
            | LendingEvent::OverpaymentClamped { obligation, .. }
            | LendingEvent::Withdrawn { obligation, .. } => *obligation,
        }
    }

    /// Reserve touched by this event, if any
    pub fn reserve(&self) -> Option<Address> {
        match self {
            LendingEvent::MarketInitialized { .. } | LendingEvent::OverpaymentClamped { .. } => None,
            LendingEvent::ReserveInitialized { reserve, .. }
            | LendingEvent::ObligationInitialized { reserve, .. }
            | LendingEvent::Supplied { reserve, .. }
            | LendingEvent::Borrowed { reserve, .. }
            | LendingEvent::Repaid { reserve, .. }
            | LendingEvent::Withdrawn { reserve, .. } => Some(*reserve),
        }
    }

    /// Get the event type name (snake_case, matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            LendingEvent::MarketInitialized { .. } => "market_initialized",
            LendingEvent::ReserveInitialized { .. } => "reserve_initialized",
            LendingEvent::ObligationInitialized { .. } => "obligation_initialized",
            LendingEvent::Supplied { .. } => "supplied",
            LendingEvent::Borrowed { .. } => "borrowed",
            LendingEvent::Repaid { .. } => "repaid",
            LendingEvent::OverpaymentClamped { .. } => "overpayment_clamped",
            LendingEvent::Withdrawn { .. } => "withdrawn",
        }
    }

    /// When the event occurred
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LendingEvent::MarketInitialized { timestamp, .. }
            | LendingEvent::ReserveInitialized { timestamp, .. }
            | LendingEvent::ObligationInitialized { timestamp, .. }
            | LendingEvent::Supplied { timestamp, .. }
            | LendingEvent::Borrowed { timestamp, .. }
            | LendingEvent::Repaid { timestamp, .. }
            | LendingEvent::OverpaymentClamped { timestamp, .. }
            | LendingEvent::Withdrawn { timestamp, .. } => *timestamp,
        }
    }
}
