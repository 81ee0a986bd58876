//! Obligation accounting: collateral valuation and solvency.
//!
//! Collateral is a share of the same liquidity asset it backs, so its value
//! in liquidity units is just its redemption amount. No price feed is
//! involved.
//!
//! Solvency invariant, checked on every borrow and withdraw:
//!
//! ```text
//! liquidity_borrowed <= floor(collateral_value * loan_to_value)
//! ```

use sealend_domain::{LoanToValue, Obligation, Reserve};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::exchange::collateral_to_liquidity;

/// Liquidity value of the obligation's deposited collateral
pub fn collateral_value(obligation: &Obligation, reserve: &Reserve) -> EngineResult<u64> {
    if obligation.collateral_deposited == 0 {
        return Ok(0);
    }
    collateral_to_liquidity(reserve, obligation.collateral_deposited)
}

/// Additional liquidity the obligation may borrow right now
pub fn max_borrowable(
    obligation: &Obligation,
    reserve: &Reserve,
    ltv: LoanToValue,
) -> EngineResult<u64> {
    let capacity = ltv.capacity(collateral_value(obligation, reserve)?)?;
    Ok(capacity.saturating_sub(obligation.liquidity_borrowed))
}

/// Check that borrowing `requested` keeps the obligation solvent
pub fn can_borrow(
    obligation: &Obligation,
    reserve: &Reserve,
    ltv: LoanToValue,
    requested: u64,
) -> EngineResult<()> {
    let allowed = max_borrowable(obligation, reserve, ltv)?;
    if requested > allowed {
        return Err(EngineError::InsufficientCollateral { requested, allowed });
    }
    Ok(())
}

/// Check that withdrawing `requested` collateral keeps the obligation solvent
pub fn can_withdraw(
    obligation: &Obligation,
    reserve: &Reserve,
    ltv: LoanToValue,
    requested: u64,
) -> EngineResult<()> {
    if requested > obligation.collateral_deposited {
        return Err(EngineError::InsufficientCollateral {
            requested,
            allowed: obligation.collateral_deposited,
        });
    }

    if !obligation.has_debt() {
        return Ok(());
    }

    let remaining = obligation.collateral_deposited - requested;
    let remaining_value =
        if remaining == 0 { 0 } else { collateral_to_liquidity(reserve, remaining)? };
    let capacity = ltv.capacity(remaining_value)?;

    if capacity < obligation.liquidity_borrowed {
        let allowed = max_withdrawable(obligation, reserve, ltv)?;
        debug!(
            obligation = %obligation.address,
            requested,
            allowed,
            debt = obligation.liquidity_borrowed,
            "Withdraw would break solvency"
        );
        return Err(EngineError::InsufficientCollateral { requested, allowed });
    }

    Ok(())
}

/// Largest collateral amount that can leave without breaking solvency.
///
/// Binary search over the monotone "remaining capacity covers debt" predicate,
/// so the answer agrees exactly with [`can_withdraw`] under floor rounding.
fn max_withdrawable(
    obligation: &Obligation,
    reserve: &Reserve,
    ltv: LoanToValue,
) -> EngineResult<u64> {
    let covers = |withdraw: u64| -> EngineResult<bool> {
        let remaining = obligation.collateral_deposited - withdraw;
        let value = if remaining == 0 { 0 } else { collateral_to_liquidity(reserve, remaining)? };
        Ok(ltv.capacity(value)? >= obligation.liquidity_borrowed)
    };

    let (mut low, mut high) = (0u64, obligation.collateral_deposited);
    if !covers(low)? {
        return Ok(0);
    }
    while low < high {
        let mid = low + (high - low).div_ceil(2);
        if covers(mid)? {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

/// Charge `amount` of new debt to the obligation and the reserve
pub fn apply_borrow(
    obligation: &mut Obligation,
    reserve: &mut Reserve,
    amount: u64,
) -> EngineResult<()> {
    obligation.add_debt(amount)?;
    reserve.record_borrow(amount)?;
    Ok(())
}

/// Outcome of planning a repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepayPlan {
    /// Amount the caller asked to repay
    pub requested: u64,
    /// Amount actually owed and transferred
    pub effective: u64,
}

impl RepayPlan {
    /// Request exceeded the outstanding debt
    pub fn is_clamped(&self) -> bool {
        self.effective < self.requested
    }
}

/// Reduce debt by `min(requested, liquidity_borrowed)`
pub fn apply_repay(
    obligation: &mut Obligation,
    reserve: &mut Reserve,
    requested: u64,
) -> EngineResult<RepayPlan> {
    if !obligation.has_debt() {
        return Err(EngineError::NoDebt(obligation.address));
    }

    let effective = requested.min(obligation.liquidity_borrowed);
    obligation.reduce_debt(effective)?;
    reserve.record_repayment(effective)?;

    Ok(RepayPlan { requested, effective })
}

// =============================================================================
// Tests
// =============================================================================
