//! Property tests over generated operation sequences.

use std::future::Future;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal_macros::dec;
use sealend_domain::Address;
use sealend_engine::collateral_value;
use sealend_exec::{CustodyPort, ErrorKind, ExecError};
use sealend_testkit::{open_position, reserve_balances, TestHarness, DEFAULT_BALANCE};

#[derive(Debug, Clone, Copy)]
enum Op {
    Supply(u64),
    Borrow(u64),
    Repay(u64),
    Withdraw(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..50_000).prop_map(Op::Supply),
        (1u64..20_000).prop_map(Op::Borrow),
        (1u64..20_000).prop_map(Op::Repay),
        (1u64..50_000).prop_map(Op::Withdraw),
    ]
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn fail(err: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(err.to_string())
}

/// Failures a random sequence is allowed to hit
fn is_expected(err: &ExecError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::InsufficientCollateral
            | ErrorKind::InsufficientFunds
            | ErrorKind::NoDebt
            | ErrorKind::InvalidAmount
            | ErrorKind::EmptyReserve
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reserve totals match custody and the obligation stays solvent after every step.
    #[test]
    fn test_conservation_and_solvency(ops in prop::collection::vec(op_strategy(), 1..40)) {
        block_on(async {
            let h = TestHarness::with_ltv(dec!(0.5)).map_err(fail)?;
            let position = open_position(&h, h.owner).await.map_err(fail)?;
            let obligation = position.obligation.address;
            let ltv = h.program.params().loan_to_value;

            for op in ops {
                let result = match op {
                    Op::Supply(n) => h.program.supply(h.owner, obligation, n).await,
                    Op::Borrow(n) => h.program.borrow(h.owner, obligation, n).await,
                    Op::Repay(n) => h.program.repay(h.owner, obligation, n).await,
                    Op::Withdraw(n) => h.program.withdraw(h.owner, obligation, n).await,
                };
                if let Err(e) = &result {
                    prop_assert!(is_expected(e), "unexpected failure on {:?}: {}", op, e);
                }

                let reserve = h.program.reserve(position.reserve.address).await.map_err(fail)?
                    .ok_or_else(|| fail("reserve vanished"))?;
                let record = h.program.obligation(obligation).await.map_err(fail)?
                    .ok_or_else(|| fail("obligation vanished"))?;
                let balances = reserve_balances(&h, reserve.address).await.map_err(fail)?;
                let wallet = h.custody.balance_of(h.liquidity_mint, h.owner).await.map_err(fail)?;

                prop_assert!(reserve.is_consistent());
                prop_assert_eq!(balances.liquidity, reserve.available_liquidity());
                prop_assert_eq!(balances.collateral_supply, reserve.total_collateral_minted);
                prop_assert_eq!(balances.collateral, record.collateral_deposited);
                prop_assert_eq!(wallet + balances.liquidity, DEFAULT_BALANCE);

                let value = collateral_value(&record, &reserve).map_err(fail)?;
                prop_assert!(record.liquidity_borrowed <= ltv.capacity(value).map_err(fail)?);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Supplying then withdrawing all resulting collateral returns the deposit.
    #[test]
    fn test_supply_withdraw_round_trip(seed in 0u64..100_000, amount in 1u64..500_000) {
        block_on(async {
            let h = TestHarness::new().map_err(fail)?;
            let earlier = h.wallet("earlier", seed + 1).map_err(fail)?;
            let earlier_position = open_position(&h, earlier).await.map_err(fail)?;
            h.program.supply(earlier, earlier_position.obligation.address, seed + 1).await.map_err(fail)?;

            let position = open_position(&h, h.owner).await.map_err(fail)?;
            let before = h.custody.balance_of(h.liquidity_mint, h.owner).await.map_err(fail)?;

            let supplied = h.program.supply(h.owner, position.obligation.address, amount).await.map_err(fail)?;
            let withdrawn = h
                .program
                .withdraw(h.owner, position.obligation.address, supplied.collateral_amount)
                .await
                .map_err(fail)?;

            prop_assert!(withdrawn.liquidity_amount <= amount);
            prop_assert!(withdrawn.liquidity_amount + 1 >= amount);
            let after = h.custody.balance_of(h.liquidity_mint, h.owner).await.map_err(fail)?;
            prop_assert_eq!(before - after, amount - withdrawn.liquidity_amount);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Repaying more than the debt transfers exactly the debt.
    #[test]
    fn test_repay_clamps_to_debt(supply in 2u64..100_000, share in 1u64..=100, extra in 1u64..10_000) {
        block_on(async {
            let h = TestHarness::with_ltv(dec!(0.5)).map_err(fail)?;
            let position = open_position(&h, h.owner).await.map_err(fail)?;
            let obligation = position.obligation.address;

            h.program.supply(h.owner, obligation, supply).await.map_err(fail)?;
            let limit = h.program.max_borrowable(obligation).await.map_err(fail)?;
            let debt = (limit * share / 100).max(1);
            h.program.borrow(h.owner, obligation, debt).await.map_err(fail)?;

            let before = h.custody.balance_of(h.liquidity_mint, h.owner).await.map_err(fail)?;
            let receipt = h.program.repay(h.owner, obligation, debt + extra).await.map_err(fail)?;
            let after = h.custody.balance_of(h.liquidity_mint, h.owner).await.map_err(fail)?;

            prop_assert_eq!(receipt.liquidity_amount, debt);
            prop_assert_eq!(before - after, debt);
            let overpayment = receipt.overpayment.ok_or_else(|| fail("no overpayment signal"))?;
            prop_assert_eq!(overpayment.requested, debt + extra);
            prop_assert_eq!(overpayment.repaid, debt);

            let record = h.program.obligation(obligation).await.map_err(fail)?
                .ok_or_else(|| fail("obligation vanished"))?;
            prop_assert_eq!(record.liquidity_borrowed, 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// A stranger can never move funds through someone else's obligation.
    #[test]
    fn test_only_owner_acts(amount in 1u64..10_000) {
        block_on(async {
            let h = TestHarness::new().map_err(fail)?;
            let position = open_position(&h, h.owner).await.map_err(fail)?;
            let stranger = Address::from_label("stranger");
            h.custody.airdrop(h.liquidity_mint, stranger, amount).map_err(fail)?;
            h.program.supply(h.owner, position.obligation.address, amount).await.map_err(fail)?;

            let obligation = position.obligation.address;
            for result in [
                h.program.supply(stranger, obligation, amount).await,
                h.program.borrow(stranger, obligation, 1).await,
                h.program.withdraw(stranger, obligation, amount).await,
            ] {
                let err = result.err().ok_or_else(|| fail("stranger succeeded"))?;
                prop_assert_eq!(err.kind(), ErrorKind::Unauthorized);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
