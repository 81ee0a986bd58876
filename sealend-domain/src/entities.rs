//! Ledger Records for Sea Lending
//!
//! The three persistent record kinds. Each record knows its own derived
//! address; custody accounts and the collateral mint are derived from the
//! reserve address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{
    collateral_mint_address, collateral_supply_address, lending_market_address,
    liquidity_supply_address, obligation_address, reserve_address,
};
use crate::value_objects::{Address, DomainError};

// =============================================================================
// LendingMarket
// =============================================================================

/// Root record, one per owner.
///
/// Immutable after creation. The market is the authority over every custody
/// account and collateral mint of its reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingMarket {
    /// Derived from the owner
    pub address: Address,
    /// Account that initialized the market
    pub owner: Address,
    /// When the market was initialized
    pub created_at: DateTime<Utc>,
}

impl LendingMarket {
    /// Create the market record for `owner` at its derived address
    pub fn new(owner: Address) -> Self {
        Self {
            address: lending_market_address(&owner),
            owner,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Reserve
// =============================================================================

/// Per-asset pool pairing a liquidity asset with its collateral asset.
///
/// # Invariants
/// - `total_collateral_minted == 0` iff `total_liquidity_supplied == 0`
/// - `total_borrowed <= total_liquidity_supplied`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    /// Derived from market and liquidity mint
    pub address: Address,
    /// Owning market, authority over the custody accounts
    pub lending_market: Address,

    // Liquidity side
    /// Asset lent and borrowed
    pub liquidity_mint: Address,
    /// Custody account holding supplied liquidity
    pub liquidity_supply: Address,

    // Collateral side (protocol-minted)
    /// Protocol mint of the collateral token
    pub collateral_mint: Address,
    /// Custody account holding deposited collateral
    pub collateral_supply: Address,
    /// Decimals of the collateral mint
    pub collateral_decimals: u8,

    // Running totals
    /// Liquidity supplied, net of withdrawals
    pub total_liquidity_supplied: u64,
    /// Collateral tokens outstanding
    pub total_collateral_minted: u64,
    /// Liquidity lent out and not yet repaid
    pub total_borrowed: u64,

    // Audit
    /// When the reserve was initialized
    pub created_at: DateTime<Utc>,
    /// Last committed transition
    pub updated_at: DateTime<Utc>,
}

impl Reserve {
    /// Create an empty reserve with every dependent address derived
    pub fn new(lending_market: Address, liquidity_mint: Address, collateral_decimals: u8) -> Self {
        let address = reserve_address(&lending_market, &liquidity_mint);
        let collateral_mint = collateral_mint_address(&address);
        let now = Utc::now();

        Self {
            address,
            lending_market,
            liquidity_mint,
            liquidity_supply: liquidity_supply_address(&address, &liquidity_mint),
            collateral_mint,
            collateral_supply: collateral_supply_address(&collateral_mint),
            collateral_decimals,
            total_liquidity_supplied: 0,
            total_collateral_minted: 0,
            total_borrowed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// No collateral outstanding
    pub fn is_empty(&self) -> bool {
        self.total_collateral_minted == 0
    }

    /// Liquidity that should sit in the custody account right now
    pub fn available_liquidity(&self) -> u64 {
        self.total_liquidity_supplied.saturating_sub(self.total_borrowed)
    }

    /// Check the zero-iff-zero totals invariant
    pub fn is_consistent(&self) -> bool {
        (self.total_collateral_minted == 0) == (self.total_liquidity_supplied == 0)
            && self.total_borrowed <= self.total_liquidity_supplied
    }

    /// Record a deposit of liquidity against freshly minted collateral
    pub fn record_deposit(&mut self, liquidity: u64, collateral: u64) -> Result<(), DomainError> {
        let supplied = checked_add(self.total_liquidity_supplied, liquidity, "reserve liquidity")?;
        let minted = checked_add(self.total_collateral_minted, collateral, "reserve collateral")?;

        self.total_liquidity_supplied = supplied;
        self.total_collateral_minted = minted;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a redemption of collateral for liquidity
    pub fn record_redemption(&mut self, liquidity: u64, collateral: u64) -> Result<(), DomainError> {
        let supplied = checked_sub(self.total_liquidity_supplied, liquidity, "reserve liquidity")?;
        let minted = checked_sub(self.total_collateral_minted, collateral, "reserve collateral")?;

        self.total_liquidity_supplied = supplied;
        self.total_collateral_minted = minted;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record liquidity lent out of custody
    pub fn record_borrow(&mut self, amount: u64) -> Result<(), DomainError> {
        self.total_borrowed = checked_add(self.total_borrowed, amount, "reserve borrowed")?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record liquidity returned to custody
    pub fn record_repayment(&mut self, amount: u64) -> Result<(), DomainError> {
        self.total_borrowed = checked_sub(self.total_borrowed, amount, "reserve borrowed")?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Obligation
// =============================================================================

/// A borrower's position against one reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Derived from owner and reserve
    pub address: Address,
    /// The only account allowed to act on the obligation
    pub owner: Address,
    /// Market of the reserve
    pub lending_market: Address,
    /// Reserve the position is held against
    pub reserve: Address,

    /// Collateral-token units held in custody on the owner's behalf
    pub collateral_deposited: u64,
    /// Outstanding principal in liquidity-token units
    pub liquidity_borrowed: u64,

    // Audit
    /// When the obligation was initialized
    pub created_at: DateTime<Utc>,
    /// Last committed transition
    pub updated_at: DateTime<Utc>,
}

impl Obligation {
    /// Create an empty obligation for `owner` against `reserve`
    pub fn new(owner: Address, lending_market: Address, reserve: Address) -> Self {
        let now = Utc::now();
        Self {
            address: obligation_address(&owner, &reserve),
            owner,
            lending_market,
            reserve,
            collateral_deposited: 0,
            liquidity_borrowed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether `caller` owns this obligation
    pub fn is_owned_by(&self, caller: &Address) -> bool {
        self.owner == *caller
    }

    /// Check whether any debt is outstanding
    pub fn has_debt(&self) -> bool {
        self.liquidity_borrowed > 0
    }

    /// Credit freshly minted collateral
    pub fn deposit_collateral(&mut self, amount: u64) -> Result<(), DomainError> {
        self.collateral_deposited =
            checked_add(self.collateral_deposited, amount, "obligation collateral")?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Debit collateral being redeemed
    pub fn withdraw_collateral(&mut self, amount: u64) -> Result<(), DomainError> {
        self.collateral_deposited =
            checked_sub(self.collateral_deposited, amount, "obligation collateral")?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Increase outstanding debt
    pub fn add_debt(&mut self, amount: u64) -> Result<(), DomainError> {
        self.liquidity_borrowed = checked_add(self.liquidity_borrowed, amount, "obligation debt")?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Decrease outstanding debt
    pub fn reduce_debt(&mut self, amount: u64) -> Result<(), DomainError> {
        self.liquidity_borrowed = checked_sub(self.liquidity_borrowed, amount, "obligation debt")?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn checked_add(current: u64, amount: u64, what: &str) -> Result<u64, DomainError> {
    current
        .checked_add(amount)
        .ok_or_else(|| DomainError::Overflow(format!("{}: {} + {}", what, current, amount)))
}

fn checked_sub(current: u64, amount: u64, what: &str) -> Result<u64, DomainError> {
    current
        .checked_sub(amount)
        .ok_or_else(|| DomainError::Underflow(format!("{}: {} - {}", what, current, amount)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> LendingMarket {
        LendingMarket::new(Address::from_label("owner"))
    }

    #[test]
    fn test_market_at_derived_address() {
        let owner = Address::from_label("owner");
        let market = LendingMarket::new(owner);
        assert_eq!(market.address, lending_market_address(&owner));
        assert_eq!(market.owner, owner);
    }

    #[test]
    fn test_reserve_creation() {
        let market = market();
        let mint = Address::from_label("usdc");
        let reserve = Reserve::new(market.address, mint, 6);

        assert_eq!(reserve.address, reserve_address(&market.address, &mint));
        assert_eq!(reserve.collateral_mint, collateral_mint_address(&reserve.address));
        assert_eq!(reserve.collateral_supply, collateral_supply_address(&reserve.collateral_mint));
        assert!(reserve.is_empty());
        assert!(reserve.is_consistent());
        assert_eq!(reserve.available_liquidity(), 0);
    }

    #[test]
    fn test_reserve_deposit_and_redemption() {
        let mut reserve = Reserve::new(market().address, Address::from_label("usdc"), 6);

        reserve.record_deposit(200, 200).unwrap();
        assert_eq!(reserve.total_liquidity_supplied, 200);
        assert_eq!(reserve.total_collateral_minted, 200);

        reserve.record_redemption(200, 200).unwrap();
        assert!(reserve.is_empty());
        assert!(reserve.is_consistent());
    }

    #[test]
    fn test_reserve_rejects_underflow() {
        let mut reserve = Reserve::new(market().address, Address::from_label("usdc"), 6);
        let result = reserve.record_redemption(1, 1);

        assert!(matches!(result, Err(DomainError::Underflow(_))));
        assert_eq!(reserve.total_liquidity_supplied, 0);
    }

    #[test]
    fn test_reserve_deposit_overflow_leaves_totals() {
        let mut reserve = Reserve::new(market().address, Address::from_label("usdc"), 6);
        reserve.record_deposit(u64::MAX, 10).unwrap();

        let result = reserve.record_deposit(1, 1);
        assert!(matches!(result, Err(DomainError::Overflow(_))));
        assert_eq!(reserve.total_collateral_minted, 10);
    }

    #[test]
    fn test_reserve_available_liquidity() {
        let mut reserve = Reserve::new(market().address, Address::from_label("usdc"), 6);
        reserve.record_deposit(200, 200).unwrap();
        reserve.record_borrow(50).unwrap();
        assert_eq!(reserve.available_liquidity(), 150);

        reserve.record_repayment(50).unwrap();
        assert_eq!(reserve.available_liquidity(), 200);
    }

    #[test]
    fn test_obligation_ownership() {
        let owner = Address::from_label("owner");
        let market = market();
        let reserve = Reserve::new(market.address, Address::from_label("usdc"), 6);
        let obligation = Obligation::new(owner, market.address, reserve.address);

        assert_eq!(obligation.address, obligation_address(&owner, &reserve.address));
        assert!(obligation.is_owned_by(&owner));
        assert!(!obligation.is_owned_by(&Address::from_label("mallory")));
        assert!(!obligation.has_debt());
    }

    #[test]
    fn test_obligation_debt_cycle() {
        let market = market();
        let mut obligation =
            Obligation::new(Address::from_label("owner"), market.address, Address::from_label("r"));

        obligation.deposit_collateral(200).unwrap();
        obligation.add_debt(100).unwrap();
        assert!(obligation.has_debt());

        obligation.reduce_debt(100).unwrap();
        assert!(!obligation.has_debt());
        assert!(obligation.reduce_debt(1).is_err());
    }

    #[test]
    fn test_record_serialization() {
        let reserve = Reserve::new(market().address, Address::from_label("usdc"), 6);
        let json = serde_json::to_string(&reserve).unwrap();
        let parsed: Reserve = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reserve);
    }
}
