//! Value Objects for the Sea Lending Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation and record arithmetic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Address string is not 32 bytes of hex
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Loan-to-value ratio outside (0, 1]
    #[error("Invalid loan-to-value ratio: {0}")]
    InvalidLoanToValue(String),

    /// Collateral mint decimals out of range
    #[error("Invalid collateral decimals: {0}")]
    InvalidDecimals(u8),

    /// A running total would exceed u64
    #[error("Amount overflow: {0}")]
    Overflow(String),

    /// A running total would drop below zero
    #[error("Amount underflow: {0}")]
    Underflow(String),
}

// =============================================================================
// Address
// =============================================================================

/// 32-byte identity of a participant, mint, custody account, or record.
///
/// Record addresses are never random: they come out of
/// [`derive_address`](crate::address::derive_address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// Length of an address in bytes
    pub const LEN: usize = 32;

    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for a human-readable label.
    ///
    /// Used for wallets and externally-created mints in tests and the
    /// scenario runner.
    ///
    /// # Examples
    /// ```
    /// # use sealend_domain::Address;
    /// assert_eq!(Address::from_label("owner"), Address::from_label("owner"));
    /// assert_ne!(Address::from_label("owner"), Address::from_label("mint"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(b"sealend/label");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| DomainError::InvalidAddress(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            DomainError::InvalidAddress(format!("expected {} bytes, got {}", Self::LEN, v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// LoanToValue
// =============================================================================

/// Fraction of collateral value that may be borrowed.
///
/// # Invariants
/// - 0 < ratio <= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanToValue(Decimal);

impl LoanToValue {
    /// Create a new ratio with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLoanToValue` if ratio is not in (0, 1]
    pub fn new(ratio: Decimal) -> Result<Self, DomainError> {
        if ratio <= Decimal::ZERO {
            return Err(DomainError::InvalidLoanToValue(format!("{} must be positive", ratio)));
        }
        if ratio > Decimal::ONE {
            return Err(DomainError::InvalidLoanToValue(format!("{} cannot exceed 1", ratio)));
        }
        Ok(Self(ratio))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Borrowing capacity of `value` liquidity units, rounded down.
    ///
    /// # Examples
    /// ```
    /// # use sealend_domain::LoanToValue;
    /// # use rust_decimal_macros::dec;
    /// let ltv = LoanToValue::new(dec!(0.75)).unwrap();
    /// assert_eq!(ltv.capacity(200).unwrap(), 150);
    /// assert_eq!(ltv.capacity(3).unwrap(), 2);
    /// ```
    pub fn capacity(&self, value: u64) -> Result<u64, DomainError> {
        Decimal::from(value)
            .checked_mul(self.0)
            .map(|v| v.floor())
            .and_then(|v| v.to_u64())
            .ok_or_else(|| DomainError::Overflow(format!("capacity of {} at {}", value, self.0)))
    }
}

impl Default for LoanToValue {
    fn default() -> Self {
        Self(Decimal::new(75, 2))
    }
}

impl fmt::Display for LoanToValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ProtocolParams
// =============================================================================

/// Protocol-wide constants shared by every reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Loan-to-value ratio applied on borrow and withdraw
    pub loan_to_value: LoanToValue,
    /// Decimals of every protocol-minted collateral token
    pub collateral_decimals: u8,
}

impl ProtocolParams {
    /// Largest decimals value a mint may carry
    pub const MAX_DECIMALS: u8 = 18;

    /// Create validated parameters
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDecimals` if decimals exceed `MAX_DECIMALS`
    pub fn new(loan_to_value: LoanToValue, collateral_decimals: u8) -> Result<Self, DomainError> {
        if collateral_decimals > Self::MAX_DECIMALS {
            return Err(DomainError::InvalidDecimals(collateral_decimals));
        }
        Ok(Self { loan_to_value, collateral_decimals })
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            loan_to_value: LoanToValue::default(),
            collateral_decimals: 6,
        }
    }
}

impl fmt::Display for ProtocolParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProtocolParams {{ ltv: {}, collateral_decimals: {} }}",
            self.loan_to_value, self.collateral_decimals
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_address_hex_round_trip() {
        let address = Address::from_label("alice");
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let result = "abcd".parse::<Address>();
        assert!(matches!(result, Err(DomainError::InvalidAddress(_))));

        let result = "zz".parse::<Address>();
        assert!(matches!(result, Err(DomainError::InvalidAddress(_))));
    }

    #[test]
    fn test_loan_to_value_bounds() {
        assert!(LoanToValue::new(dec!(0)).is_err());
        assert!(LoanToValue::new(dec!(-0.5)).is_err());
        assert!(LoanToValue::new(dec!(1.01)).is_err());
        assert!(LoanToValue::new(dec!(1)).is_ok());
        assert!(LoanToValue::new(dec!(0.5)).is_ok());
    }

    #[test]
    fn test_loan_to_value_capacity_floors() {
        let ltv = LoanToValue::new(dec!(0.5)).unwrap();
        assert_eq!(ltv.capacity(200).unwrap(), 100);
        assert_eq!(ltv.capacity(201).unwrap(), 100);
        assert_eq!(ltv.capacity(1).unwrap(), 0);
        assert_eq!(ltv.capacity(0).unwrap(), 0);
    }

    #[test]
    fn test_loan_to_value_capacity_at_u64_max() {
        let ltv = LoanToValue::new(dec!(1)).unwrap();
        assert_eq!(ltv.capacity(u64::MAX).unwrap(), u64::MAX);
    }

    #[test]
    fn test_protocol_params_defaults() {
        let params = ProtocolParams::default();
        assert_eq!(params.loan_to_value.as_decimal(), dec!(0.75));
        assert_eq!(params.collateral_decimals, 6);
    }

    #[test]
    fn test_protocol_params_rejects_decimals() {
        let result = ProtocolParams::new(LoanToValue::default(), 19);
        assert_eq!(result, Err(DomainError::InvalidDecimals(19)));
    }
}
