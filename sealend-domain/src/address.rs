//! Deterministic record addressing.
//!
//! Every ledger record and custody account lives at an address computed from
//! a fixed domain tag plus the identities it is scoped to. Any party can
//! recompute an address without a lookup table.
//!
//! Formula: `SHA256(namespace || len(tag) || tag || len(c0) || c0 || ...)`
//!
//! Every part is length-prefixed, so two distinct tags (or component lists)
//! can never produce the same preimage.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::value_objects::Address;

/// Namespace mixed into every derivation
const PROGRAM_NAMESPACE: &[u8] = b"sea-lending/v1";

/// Fixed tags separating the address spaces of each record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainTag {
    /// `LendingMarket`, scoped to its owner
    LendingMarket,
    /// `Reserve`, scoped to market and liquidity mint
    Reserve,
    /// `Obligation`, scoped to owner and reserve
    Obligation,
    /// Reserve's liquidity custody account
    LiquiditySupply,
    /// Reserve's protocol-minted collateral token
    CollateralMint,
    /// Reserve's collateral custody account
    CollateralSupply,
}

impl DomainTag {
    /// Tag bytes as fed to the hash
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainTag::LendingMarket => "lending-market",
            DomainTag::Reserve => "reserve",
            DomainTag::Obligation => "obligation",
            DomainTag::LiquiditySupply => "liquidity-supply",
            DomainTag::CollateralMint => "collateral-mint",
            DomainTag::CollateralSupply => "collateral-supply",
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive an address from a domain tag and its scoping components.
///
/// Pure function: the same inputs always yield the same address.
pub fn derive_address(tag: DomainTag, components: &[&[u8]]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(PROGRAM_NAMESPACE);

    let tag = tag.as_str().as_bytes();
    hasher.update((tag.len() as u64).to_le_bytes());
    hasher.update(tag);

    for component in components {
        hasher.update((component.len() as u64).to_le_bytes());
        hasher.update(component);
    }

    Address::new(hasher.finalize().into())
}

/// Market owned by `owner`
pub fn lending_market_address(owner: &Address) -> Address {
    derive_address(DomainTag::LendingMarket, &[owner.as_ref()])
}

/// Reserve of `liquidity_mint` inside `market`
pub fn reserve_address(market: &Address, liquidity_mint: &Address) -> Address {
    derive_address(DomainTag::Reserve, &[market.as_ref(), liquidity_mint.as_ref()])
}

/// Obligation of `owner` against `reserve`
pub fn obligation_address(owner: &Address, reserve: &Address) -> Address {
    derive_address(DomainTag::Obligation, &[owner.as_ref(), reserve.as_ref()])
}

/// Liquidity custody account of `reserve`
pub fn liquidity_supply_address(reserve: &Address, liquidity_mint: &Address) -> Address {
    derive_address(DomainTag::LiquiditySupply, &[reserve.as_ref(), liquidity_mint.as_ref()])
}

/// Collateral mint of `reserve`
pub fn collateral_mint_address(reserve: &Address) -> Address {
    derive_address(DomainTag::CollateralMint, &[reserve.as_ref()])
}

/// Collateral custody account for `collateral_mint`
pub fn collateral_supply_address(collateral_mint: &Address) -> Address {
    derive_address(DomainTag::CollateralSupply, &[collateral_mint.as_ref()])
}
