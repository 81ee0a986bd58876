//! Conversion between liquidity and collateral amounts.
//!
//! The reserve's exchange rate is `total_liquidity_supplied / total_collateral_minted`.
//! Collateral is a share of the reserve: minting and burning at the current
//! rate keeps every existing share's value intact.
//!
//! ## Rounding
//!
//! Both directions round **down**. Minting floors the collateral a depositor
//! receives, redeeming floors the liquidity a withdrawer receives. The caller
//! is never over-credited, so repeated small deposits and withdrawals cannot
//! drain value from the reserve.

use rust_decimal::Decimal;
use sealend_domain::Reserve;

use crate::error::{EngineError, EngineResult};

/// Collateral minted for `liquidity_amount` deposited into `reserve`.
///
/// The first deposit (no collateral outstanding) mints 1:1.
pub fn liquidity_to_collateral(reserve: &Reserve, liquidity_amount: u64) -> EngineResult<u64> {
    if reserve.total_collateral_minted == 0 {
        return Ok(liquidity_amount);
    }

    mul_div_floor(
        liquidity_amount,
        reserve.total_collateral_minted,
        reserve.total_liquidity_supplied,
    )
}

/// Liquidity redeemed for `collateral_amount` burned from `reserve`.
///
/// # Errors
/// `EngineError::EmptyReserve` if no collateral is outstanding.
pub fn collateral_to_liquidity(reserve: &Reserve, collateral_amount: u64) -> EngineResult<u64> {
    if reserve.total_collateral_minted == 0 {
        return Err(EngineError::EmptyReserve(reserve.address));
    }

    mul_div_floor(
        collateral_amount,
        reserve.total_liquidity_supplied,
        reserve.total_collateral_minted,
    )
}

/// Current liquidity per collateral unit, `None` for an empty reserve
pub fn exchange_rate(reserve: &Reserve) -> Option<Decimal> {
    if reserve.total_collateral_minted == 0 {
        return None;
    }
    Decimal::from(reserve.total_liquidity_supplied)
        .checked_div(Decimal::from(reserve.total_collateral_minted))
}

/// `floor(amount * numerator / denominator)` without intermediate overflow
fn mul_div_floor(amount: u64, numerator: u64, denominator: u64) -> EngineResult<u64> {
    if denominator == 0 {
        return Err(EngineError::DivisionByZero(format!(
            "{} * {} / 0",
            amount, numerator
        )));
    }

    let result = u128::from(amount) * u128::from(numerator) / u128::from(denominator);
    u64::try_from(result).map_err(|_| {
        EngineError::DivisionByZero(format!(
            "{} * {} / {} exceeds u64",
            amount, numerator, denominator
        ))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use sealend_domain::Address;

    fn reserve_with(supplied: u64, minted: u64) -> Reserve {
        let mut reserve = Reserve::new(Address::from_label("market"), Address::from_label("usdc"), 6);
        reserve.total_liquidity_supplied = supplied;
        reserve.total_collateral_minted = minted;
        reserve
    }

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let reserve = reserve_with(0, 0);
        assert_eq!(liquidity_to_collateral(&reserve, 200).unwrap(), 200);
        assert_eq!(exchange_rate(&reserve), None);
    }

    #[test]
    fn test_flat_rate_conversion() {
        let reserve = reserve_with(500, 500);
        assert_eq!(liquidity_to_collateral(&reserve, 200).unwrap(), 200);
        assert_eq!(collateral_to_liquidity(&reserve, 200).unwrap(), 200);
        assert_eq!(exchange_rate(&reserve), Some(dec!(1)));
    }

    #[test]
    fn test_conversion_floors_both_ways() {
        // Rate 1.5 liquidity per collateral
        let reserve = reserve_with(300, 200);

        // 100 liquidity → 66.67 collateral → 66
        assert_eq!(liquidity_to_collateral(&reserve, 100).unwrap(), 66);
        // 67 collateral → 100.5 liquidity → 100
        assert_eq!(collateral_to_liquidity(&reserve, 67).unwrap(), 100);
        assert_eq!(exchange_rate(&reserve), Some(dec!(1.5)));
    }

    #[test]
    fn test_redeem_from_empty_reserve() {
        let reserve = reserve_with(0, 0);
        let result = collateral_to_liquidity(&reserve, 10);
        assert_eq!(result, Err(EngineError::EmptyReserve(reserve.address)));
    }

    #[test]
    fn test_inconsistent_reserve_is_division_by_zero() {
        let reserve = reserve_with(0, 100);
        let result = liquidity_to_collateral(&reserve, 10);
        assert!(matches!(result, Err(EngineError::DivisionByZero(_))));
    }

    #[test]
    fn test_large_amounts_do_not_overflow() {
        let reserve = reserve_with(u64::MAX, u64::MAX);
        assert_eq!(liquidity_to_collateral(&reserve, u64::MAX).unwrap(), u64::MAX);
    }

    #[test]
    fn test_result_exceeding_u64_is_rejected() {
        let reserve = reserve_with(1, u64::MAX);
        let result = liquidity_to_collateral(&reserve, 2);
        assert!(matches!(result, Err(EngineError::DivisionByZero(_))));
    }

    proptest! {
        #[test]
        fn prop_round_trip_never_over_credits(
            supplied in 1u64..1_000_000_000,
            minted in 1u64..1_000_000_000,
            deposit in 0u64..1_000_000_000,
        ) {
            let mut reserve = reserve_with(supplied, minted);
            let collateral = liquidity_to_collateral(&reserve, deposit).unwrap();
            reserve.total_liquidity_supplied += deposit;
            reserve.total_collateral_minted += collateral;

            let back = collateral_to_liquidity(&reserve, collateral).unwrap();
            prop_assert!(back <= deposit);
        }
    }
}
