//! Concurrent transitions on shared records stay serialized.

use std::sync::Arc;

use rust_decimal_macros::dec;
use sealend_exec::{CustodyPort, ErrorKind};
use sealend_testkit::{open_position, reserve_balances, TestHarness};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_borrows_never_exceed_capacity() {
    let h = Arc::new(TestHarness::with_ltv(dec!(0.5)).unwrap());
    let position = open_position(&h, h.owner).await.unwrap();
    let obligation = position.obligation.address;
    h.program.supply(h.owner, obligation, 1_000).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.program.borrow(h.owner, obligation, 50).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientCollateral),
        }
    }

    assert_eq!(succeeded, 10);
    let record = h.program.obligation(obligation).await.unwrap().unwrap();
    assert_eq!(record.liquidity_borrowed, 500);

    let reserve = h.program.reserve(position.reserve.address).await.unwrap().unwrap();
    assert_eq!(reserve.total_borrowed, 500);
    let balances = reserve_balances(&h, reserve.address).await.unwrap();
    assert_eq!(balances.liquidity, reserve.available_liquidity());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_suppliers_conserve_totals() {
    let h = Arc::new(TestHarness::new().unwrap());
    let base = open_position(&h, h.owner).await.unwrap();

    let mut obligations = Vec::new();
    for i in 0..8 {
        let wallet = h.wallet(&format!("supplier-{}", i), 10_000).unwrap();
        let position = open_position(&h, wallet).await.unwrap();
        obligations.push((wallet, position.obligation.address));
    }

    let mut handles = Vec::new();
    for (i, (wallet, obligation)) in obligations.iter().copied().enumerate() {
        let h = h.clone();
        let amount = 100 * (i as u64 + 1);
        handles.push(tokio::spawn(async move { h.program.supply(wallet, obligation, amount).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected: u64 = (1..=8).map(|i| 100 * i).sum();
    let reserve = h.program.reserve(base.reserve.address).await.unwrap().unwrap();
    assert_eq!(reserve.total_liquidity_supplied, expected);
    assert_eq!(reserve.total_collateral_minted, expected);

    let balances = reserve_balances(&h, reserve.address).await.unwrap();
    assert_eq!(balances.liquidity, expected);
    assert_eq!(balances.collateral_supply, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_init_creates_once() {
    let h = Arc::new(TestHarness::new().unwrap());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.program.init_lending_market(h.owner).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(h.store.market_count(), 1);
    assert_eq!(h.custody.supply_of(h.liquidity_mint).await.unwrap(), 1_000_000);
}
