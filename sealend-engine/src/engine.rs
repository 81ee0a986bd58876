//! Per-operation planning.
//!
//! The engine never mutates its inputs. Each `plan_*` method validates the
//! request against the current records and returns a [`Transition`] holding
//! the records as they should look after commit, plus the token amounts the
//! executor has to move.

use sealend_domain::{Obligation, ProtocolParams, Reserve};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::exchange::{collateral_to_liquidity, liquidity_to_collateral};
use crate::obligation::{apply_borrow, apply_repay, can_borrow, can_withdraw};

/// Staged result of a planned operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Reserve after the operation
    pub reserve: Reserve,
    /// Obligation after the operation
    pub obligation: Obligation,
    /// Liquidity moved (into custody for supply/repay, out for borrow/withdraw)
    pub liquidity_amount: u64,
    /// Collateral minted (supply) or burned (withdraw); zero otherwise
    pub collateral_amount: u64,
    /// Set when a repay request was reduced to the outstanding debt
    pub overpayment: Option<Overpayment>,
}

/// Repay request reduced to the outstanding debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overpayment {
    /// Amount the caller asked to repay
    pub requested: u64,
    /// Amount actually owed and transferred
    pub repaid: u64,
}

/// Pure planner for supply, borrow, repay, and withdraw.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    params: ProtocolParams,
}

impl Engine {
    /// Create an engine with the given protocol parameters
    pub fn new(params: ProtocolParams) -> Self {
        Self { params }
    }

    /// Protocol parameters in effect
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Plan a deposit of `liquidity_amount` for collateral at the current rate
    pub fn plan_supply(
        &self,
        reserve: &Reserve,
        obligation: &Obligation,
        liquidity_amount: u64,
    ) -> EngineResult<Transition> {
        require_nonzero(liquidity_amount, "supply")?;

        let collateral_amount = liquidity_to_collateral(reserve, liquidity_amount)?;
        if collateral_amount == 0 {
            return Err(EngineError::InvalidAmount(format!(
                "supply of {} mints no collateral",
                liquidity_amount
            )));
        }

        let mut reserve = reserve.clone();
        let mut obligation = obligation.clone();
        reserve.record_deposit(liquidity_amount, collateral_amount)?;
        obligation.deposit_collateral(collateral_amount)?;

        debug!(
            obligation = %obligation.address,
            liquidity_amount,
            collateral_amount,
            "Supply planned"
        );

        Ok(Transition {
            reserve,
            obligation,
            liquidity_amount,
            collateral_amount,
            overpayment: None,
        })
    }

    /// Plan a borrow of `liquidity_amount` against deposited collateral
    pub fn plan_borrow(
        &self,
        reserve: &Reserve,
        obligation: &Obligation,
        liquidity_amount: u64,
    ) -> EngineResult<Transition> {
        require_nonzero(liquidity_amount, "borrow")?;
        can_borrow(obligation, reserve, self.params.loan_to_value, liquidity_amount)?;

        let mut reserve = reserve.clone();
        let mut obligation = obligation.clone();
        apply_borrow(&mut obligation, &mut reserve, liquidity_amount)?;

        debug!(
            obligation = %obligation.address,
            liquidity_amount,
            debt = obligation.liquidity_borrowed,
            "Borrow planned"
        );

        Ok(Transition {
            reserve,
            obligation,
            liquidity_amount,
            collateral_amount: 0,
            overpayment: None,
        })
    }

    /// Plan a repayment, clamping to the outstanding debt
    pub fn plan_repay(
        &self,
        reserve: &Reserve,
        obligation: &Obligation,
        liquidity_amount: u64,
    ) -> EngineResult<Transition> {
        require_nonzero(liquidity_amount, "repay")?;

        let mut reserve = reserve.clone();
        let mut obligation = obligation.clone();
        let plan = apply_repay(&mut obligation, &mut reserve, liquidity_amount)?;

        let overpayment = plan.is_clamped().then_some(Overpayment {
            requested: plan.requested,
            repaid: plan.effective,
        });

        debug!(
            obligation = %obligation.address,
            requested = plan.requested,
            effective = plan.effective,
            "Repay planned"
        );

        Ok(Transition {
            reserve,
            obligation,
            liquidity_amount: plan.effective,
            collateral_amount: 0,
            overpayment,
        })
    }

    /// Plan a redemption of `collateral_amount` for liquidity
    pub fn plan_withdraw(
        &self,
        reserve: &Reserve,
        obligation: &Obligation,
        collateral_amount: u64,
    ) -> EngineResult<Transition> {
        require_nonzero(collateral_amount, "withdraw")?;
        can_withdraw(obligation, reserve, self.params.loan_to_value, collateral_amount)?;

        let liquidity_amount = collateral_to_liquidity(reserve, collateral_amount)?;
        if liquidity_amount == 0 {
            return Err(EngineError::InvalidAmount(format!(
                "withdraw of {} collateral redeems no liquidity",
                collateral_amount
            )));
        }

        let mut reserve = reserve.clone();
        let mut obligation = obligation.clone();
        reserve.record_redemption(liquidity_amount, collateral_amount)?;
        obligation.withdraw_collateral(collateral_amount)?;

        debug!(
            obligation = %obligation.address,
            collateral_amount,
            liquidity_amount,
            "Withdraw planned"
        );

        Ok(Transition {
            reserve,
            obligation,
            liquidity_amount,
            collateral_amount,
            overpayment: None,
        })
    }
}

fn require_nonzero(amount: u64, operation: &str) -> EngineResult<()> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount(format!("{} amount must be positive", operation)));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
