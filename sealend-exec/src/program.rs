//! Lending program: the protocol state machine.
//!
//! Every operation is one atomic transition:
//!
//! ```text
//! lock keys → load → Engine plan → RecordBatch + CustodyOps
//!           → Store::prepare → CustodyPort::settle → Store::commit
//! ```
//!
//! A failure before `settle` leaves no trace. `settle` is all-or-nothing.
//! `prepare` has already validated the batch, so `commit` only fails if the
//! store itself breaks; the settled ops are then reversed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use sealend_domain::{
    lending_market_address, obligation_address, reserve_address, Address, LendingEvent,
    LendingMarket, Obligation, ProtocolParams, Reserve,
};
use sealend_engine::{exchange_rate, max_borrowable, Engine, Overpayment, Transition};
use sealend_store::{RecordBatch, RecordLockGuard, Store};

use crate::error::{ExecError, ExecResult};
use crate::ports::{CustodyOp, CustodyPort};

// =============================================================================
// Receipt
// =============================================================================

/// Outcome of a committed supply, borrow, repay, or withdraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Obligation acted on
    pub obligation: Address,
    /// Reserve acted on
    pub reserve: Address,
    /// Liquidity moved into or out of custody
    pub liquidity_amount: u64,
    /// Collateral minted or burned
    pub collateral_amount: u64,
    /// Set when a repay was reduced to the outstanding debt
    pub overpayment: Option<Overpayment>,
}

impl Receipt {
    fn from_transition(transition: &Transition) -> Self {
        Self {
            obligation: transition.obligation.address,
            reserve: transition.reserve.address,
            liquidity_amount: transition.liquidity_amount,
            collateral_amount: transition.collateral_amount,
            overpayment: transition.overpayment,
        }
    }

    /// Whether the repay request was clamped
    pub fn is_clamped(&self) -> bool {
        self.overpayment.is_some()
    }
}

/// Locked, validated obligation with its reserve.
struct Position {
    _guard: RecordLockGuard,
    obligation: Obligation,
    reserve: Reserve,
}

// =============================================================================
// Lending Program
// =============================================================================

/// Executes the lending operations against custody and the record store.
pub struct LendingProgram<C: CustodyPort, S: Store> {
    /// Token custody
    custody: Arc<C>,
    /// Ledger records
    store: Arc<S>,
    /// Pure planner
    engine: Engine,
}

impl<C: CustodyPort, S: Store> LendingProgram<C, S> {
    /// Create a new program.
    pub fn new(custody: Arc<C>, store: Arc<S>, params: ProtocolParams) -> Self {
        Self { custody, store, engine: Engine::new(params) }
    }

    /// Protocol parameters in effect
    pub fn params(&self) -> &ProtocolParams {
        self.engine.params()
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the lending market owned by `owner`.
    ///
    /// Fails with `AlreadyExists` if `owner` already has one.
    pub async fn init_lending_market(&self, owner: Address) -> ExecResult<LendingMarket> {
        let address = lending_market_address(&owner);
        self.init_market_inner(owner, address)
            .await
            .map_err(|e| abort("init_lending_market", address, e))
    }

    async fn init_market_inner(&self, owner: Address, address: Address) -> ExecResult<LendingMarket> {
        let _guard = self.store.locks().acquire(&[address]).await?;

        if self.store.markets().find(address).await?.is_some() {
            return Err(ExecError::already_exists("lending_market", address));
        }

        let market = LendingMarket::new(owner);
        let mut batch = RecordBatch::new();
        batch.create_market(market.clone()).emit(LendingEvent::MarketInitialized {
            market: market.address,
            owner,
            timestamp: Utc::now(),
        });

        self.apply(batch, Vec::new()).await?;

        info!(market = %market.address, owner = %owner, "Lending market initialized");
        Ok(market)
    }

    /// Create the reserve for `liquidity_mint` under `market`.
    ///
    /// Opens the liquidity and collateral custody accounts and creates the
    /// collateral mint, all owned by the market. Any signer may call this.
    pub async fn init_reserve(
        &self,
        signer: Address,
        market: Address,
        liquidity_mint: Address,
    ) -> ExecResult<Reserve> {
        let address = reserve_address(&market, &liquidity_mint);
        self.init_reserve_inner(signer, market, liquidity_mint, address)
            .await
            .map_err(|e| abort("init_reserve", address, e))
    }

    async fn init_reserve_inner(
        &self,
        signer: Address,
        market: Address,
        liquidity_mint: Address,
        address: Address,
    ) -> ExecResult<Reserve> {
        let _guard = self.store.locks().acquire(&[market, address]).await?;

        if self.store.markets().find(market).await?.is_none() {
            return Err(ExecError::MarketNotFound(market));
        }
        if self.store.reserves().find(address).await?.is_some() {
            return Err(ExecError::already_exists("reserve", address));
        }

        let reserve = Reserve::new(market, liquidity_mint, self.params().collateral_decimals);
        let ops = vec![
            CustodyOp::CreateMint {
                mint: reserve.collateral_mint,
                authority: market,
                decimals: reserve.collateral_decimals,
            },
            CustodyOp::OpenAccount {
                asset: liquidity_mint,
                account: reserve.liquidity_supply,
                authority: market,
            },
            CustodyOp::OpenAccount {
                asset: reserve.collateral_mint,
                account: reserve.collateral_supply,
                authority: market,
            },
        ];

        let mut batch = RecordBatch::new();
        batch.create_reserve(reserve.clone()).emit(LendingEvent::ReserveInitialized {
            reserve: reserve.address,
            market,
            liquidity_mint,
            collateral_mint: reserve.collateral_mint,
            timestamp: Utc::now(),
        });

        self.apply(batch, ops).await?;

        info!(
            reserve = %reserve.address,
            market = %market,
            liquidity_mint = %liquidity_mint,
            signer = %signer,
            "Reserve initialized"
        );
        Ok(reserve)
    }

    /// Create the obligation of `owner` against `reserve`.
    pub async fn init_obligation(
        &self,
        owner: Address,
        market: Address,
        reserve: Address,
    ) -> ExecResult<Obligation> {
        let address = obligation_address(&owner, &reserve);
        self.init_obligation_inner(owner, market, reserve, address)
            .await
            .map_err(|e| abort("init_obligation", address, e))
    }

    async fn init_obligation_inner(
        &self,
        owner: Address,
        market: Address,
        reserve: Address,
        address: Address,
    ) -> ExecResult<Obligation> {
        let _guard = self.store.locks().acquire(&[address]).await?;

        if self.store.markets().find(market).await?.is_none() {
            return Err(ExecError::MarketNotFound(market));
        }
        let reserve_record = self
            .store
            .reserves()
            .find(reserve)
            .await?
            .ok_or(ExecError::ReserveNotFound(reserve))?;
        if reserve_record.lending_market != market {
            return Err(ExecError::RecordMismatch(format!(
                "reserve {} belongs to market {}, not {}",
                reserve, reserve_record.lending_market, market
            )));
        }
        if self.store.obligations().find(address).await?.is_some() {
            return Err(ExecError::already_exists("obligation", address));
        }

        let obligation = Obligation::new(owner, market, reserve);
        let mut batch = RecordBatch::new();
        batch.create_obligation(obligation.clone()).emit(LendingEvent::ObligationInitialized {
            obligation: obligation.address,
            owner,
            reserve,
            timestamp: Utc::now(),
        });

        self.apply(batch, Vec::new()).await?;

        info!(obligation = %obligation.address, owner = %owner, reserve = %reserve, "Obligation initialized");
        Ok(obligation)
    }

    // =========================================================================
    // Position operations
    // =========================================================================

    /// Deposit `amount` liquidity for collateral credited to the obligation.
    pub async fn supply(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        self.supply_inner(caller, obligation, amount)
            .await
            .map_err(|e| abort("supply", obligation, e))
    }

    async fn supply_inner(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        let position = self.lock_position(caller, obligation).await?;
        let transition = self.engine.plan_supply(&position.reserve, &position.obligation, amount)?;
        let reserve = &transition.reserve;

        let ops = vec![
            CustodyOp::TransferIn {
                asset: reserve.liquidity_mint,
                holder: caller,
                custody: reserve.liquidity_supply,
                amount: transition.liquidity_amount,
            },
            CustodyOp::Mint {
                asset: reserve.collateral_mint,
                recipient: reserve.collateral_supply,
                amount: transition.collateral_amount,
            },
        ];

        let mut batch = stage(&transition);
        batch.emit(LendingEvent::Supplied {
            obligation,
            reserve: reserve.address,
            liquidity_amount: transition.liquidity_amount,
            collateral_amount: transition.collateral_amount,
            timestamp: Utc::now(),
        });

        self.apply(batch, ops).await?;

        info!(
            obligation = %obligation,
            liquidity_amount = transition.liquidity_amount,
            collateral_amount = transition.collateral_amount,
            exchange_rate = ?exchange_rate(&transition.reserve),
            "Supplied"
        );
        Ok(Receipt::from_transition(&transition))
    }

    /// Borrow `amount` liquidity against the obligation's collateral.
    pub async fn borrow(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        self.borrow_inner(caller, obligation, amount)
            .await
            .map_err(|e| abort("borrow", obligation, e))
    }

    async fn borrow_inner(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        let position = self.lock_position(caller, obligation).await?;
        let transition = self.engine.plan_borrow(&position.reserve, &position.obligation, amount)?;
        let reserve = &transition.reserve;

        let ops = vec![CustodyOp::TransferOut {
            asset: reserve.liquidity_mint,
            custody: reserve.liquidity_supply,
            recipient: caller,
            amount: transition.liquidity_amount,
        }];

        let mut batch = stage(&transition);
        batch.emit(LendingEvent::Borrowed {
            obligation,
            reserve: reserve.address,
            liquidity_amount: transition.liquidity_amount,
            timestamp: Utc::now(),
        });

        self.apply(batch, ops).await?;

        info!(
            obligation = %obligation,
            liquidity_amount = transition.liquidity_amount,
            debt = transition.obligation.liquidity_borrowed,
            "Borrowed"
        );
        Ok(Receipt::from_transition(&transition))
    }

    /// Repay up to `amount` of outstanding debt.
    ///
    /// Requests above the debt are clamped; only the debt is transferred and
    /// the receipt carries the overpayment.
    pub async fn repay(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        self.repay_inner(caller, obligation, amount)
            .await
            .map_err(|e| abort("repay", obligation, e))
    }

    async fn repay_inner(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        let position = self.lock_position(caller, obligation).await?;
        let transition = self.engine.plan_repay(&position.reserve, &position.obligation, amount)?;
        let reserve = &transition.reserve;

        let ops = vec![CustodyOp::TransferIn {
            asset: reserve.liquidity_mint,
            holder: caller,
            custody: reserve.liquidity_supply,
            amount: transition.liquidity_amount,
        }];

        let now = Utc::now();
        let mut batch = stage(&transition);
        batch.emit(LendingEvent::Repaid {
            obligation,
            reserve: reserve.address,
            liquidity_amount: transition.liquidity_amount,
            timestamp: now,
        });
        if let Some(overpayment) = transition.overpayment {
            batch.emit(LendingEvent::OverpaymentClamped {
                obligation,
                requested: overpayment.requested,
                repaid: overpayment.repaid,
                timestamp: now,
            });
        }

        self.apply(batch, ops).await?;

        if let Some(overpayment) = transition.overpayment {
            info!(
                obligation = %obligation,
                requested = overpayment.requested,
                repaid = overpayment.repaid,
                "Repay clamped to outstanding debt"
            );
        } else {
            info!(obligation = %obligation, liquidity_amount = transition.liquidity_amount, "Repaid");
        }
        Ok(Receipt::from_transition(&transition))
    }

    /// Redeem `amount` collateral for liquidity.
    pub async fn withdraw(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        self.withdraw_inner(caller, obligation, amount)
            .await
            .map_err(|e| abort("withdraw", obligation, e))
    }

    async fn withdraw_inner(&self, caller: Address, obligation: Address, amount: u64) -> ExecResult<Receipt> {
        let position = self.lock_position(caller, obligation).await?;
        let transition =
            self.engine.plan_withdraw(&position.reserve, &position.obligation, amount)?;
        let reserve = &transition.reserve;

        let ops = vec![
            CustodyOp::Burn {
                asset: reserve.collateral_mint,
                holder: reserve.collateral_supply,
                amount: transition.collateral_amount,
            },
            CustodyOp::TransferOut {
                asset: reserve.liquidity_mint,
                custody: reserve.liquidity_supply,
                recipient: caller,
                amount: transition.liquidity_amount,
            },
        ];

        let mut batch = stage(&transition);
        batch.emit(LendingEvent::Withdrawn {
            obligation,
            reserve: reserve.address,
            collateral_amount: transition.collateral_amount,
            liquidity_amount: transition.liquidity_amount,
            timestamp: Utc::now(),
        });

        self.apply(batch, ops).await?;

        info!(
            obligation = %obligation,
            collateral_amount = transition.collateral_amount,
            liquidity_amount = transition.liquidity_amount,
            exchange_rate = ?exchange_rate(&transition.reserve),
            "Withdrawn"
        );
        Ok(Receipt::from_transition(&transition))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Load a market if it exists
    pub async fn market(&self, address: Address) -> ExecResult<Option<LendingMarket>> {
        Ok(self.store.markets().find(address).await?)
    }

    /// Load a reserve if it exists
    pub async fn reserve(&self, address: Address) -> ExecResult<Option<Reserve>> {
        Ok(self.store.reserves().find(address).await?)
    }

    /// Load an obligation if it exists
    pub async fn obligation(&self, address: Address) -> ExecResult<Option<Obligation>> {
        Ok(self.store.obligations().find(address).await?)
    }

    /// Additional liquidity the obligation may borrow right now
    pub async fn max_borrowable(&self, obligation: Address) -> ExecResult<u64> {
        let obligation = self.store.obligations().get(obligation).await?;
        let reserve = self
            .store
            .reserves()
            .find(obligation.reserve)
            .await?
            .ok_or(ExecError::ReserveNotFound(obligation.reserve))?;
        Ok(max_borrowable(&obligation, &reserve, self.params().loan_to_value)?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Lock the obligation and its reserve, then reload and cross-check them.
    async fn lock_position(&self, caller: Address, address: Address) -> ExecResult<Position> {
        // The reserve reference never changes, so an unlocked read finds the keys.
        let unlocked = self.store.obligations().get(address).await?;
        let guard = self.store.locks().acquire(&[address, unlocked.reserve]).await?;
        debug!(obligation = %address, reserve = %unlocked.reserve, "Position locked");

        let obligation = self.store.obligations().get(address).await?;
        if !obligation.is_owned_by(&caller) {
            return Err(ExecError::Unauthorized { caller, owner: obligation.owner });
        }

        let reserve = self
            .store
            .reserves()
            .find(obligation.reserve)
            .await?
            .ok_or(ExecError::ReserveNotFound(obligation.reserve))?;
        if self.store.markets().find(obligation.lending_market).await?.is_none() {
            return Err(ExecError::MarketNotFound(obligation.lending_market));
        }
        if reserve.lending_market != obligation.lending_market {
            return Err(ExecError::RecordMismatch(format!(
                "obligation {} is in market {}, reserve {} in market {}",
                obligation.address, obligation.lending_market, reserve.address, reserve.lending_market
            )));
        }

        Ok(Position { _guard: guard, obligation, reserve })
    }

    /// Validate, settle, then commit.
    async fn apply(&self, batch: RecordBatch, ops: Vec<CustodyOp>) -> ExecResult<()> {
        self.store.prepare(&batch).await?;

        if !ops.is_empty() {
            self.custody.settle(&ops).await?;
            debug!(ops = ops.len(), "Custody settled");
        }

        if let Err(e) = self.store.commit(batch).await {
            error!(error = %e, "Commit failed after custody settled, reversing");
            let undo: Vec<CustodyOp> = ops.iter().rev().map(CustodyOp::inverse).collect();
            if !undo.is_empty() {
                if let Err(undo_err) = self.custody.settle(&undo).await {
                    error!(error = %undo_err, "Custody reversal failed");
                }
            }
            return Err(e.into());
        }

        Ok(())
    }
}

/// Stage the updated records of a position transition.
fn stage(transition: &Transition) -> RecordBatch {
    let mut batch = RecordBatch::new();
    batch
        .put_reserve(transition.reserve.clone())
        .put_obligation(transition.obligation.clone());
    batch
}

fn abort(operation: &'static str, target: Address, err: ExecError) -> ExecError {
    warn!(operation, target = %target, kind = ?err.kind(), error = %err, "Operation aborted");
    err
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stub::StubCustody;
    use rust_decimal_macros::dec;
    use sealend_domain::LoanToValue;
    use sealend_store::MemoryStore;

    struct Fixture {
        program: LendingProgram<StubCustody, MemoryStore>,
        custody: Arc<StubCustody>,
        store: Arc<MemoryStore>,
        owner: Address,
        usdc: Address,
    }

    fn fixture() -> Fixture {
        let custody = Arc::new(StubCustody::new());
        let store = Arc::new(MemoryStore::new());
        let params = ProtocolParams::new(LoanToValue::new(dec!(0.5)).unwrap(), 6).unwrap();
        let owner = Address::from_label("owner");
        let usdc = Address::from_label("usdc");
        custody.create_external_mint(usdc, 6).unwrap();
        custody.airdrop(usdc, owner, 1_000).unwrap();

        let program = LendingProgram::new(custody.clone(), store.clone(), params);
        Fixture { program, custody, store, owner, usdc }
    }

    async fn open(f: &Fixture) -> (LendingMarket, Reserve, Obligation) {
        let market = f.program.init_lending_market(f.owner).await.unwrap();
        let reserve = f.program.init_reserve(f.owner, market.address, f.usdc).await.unwrap();
        let obligation =
            f.program.init_obligation(f.owner, market.address, reserve.address).await.unwrap();
        (market, reserve, obligation)
    }

    #[tokio::test]
    async fn test_init_reserve_creates_custody() {
        let f = fixture();
        let (market, reserve, _) = open(&f).await;

        assert_eq!(f.custody.mint_authority(reserve.collateral_mint).unwrap(), Some(market.address));
        assert_eq!(f.custody.decimals_of(reserve.collateral_mint).unwrap(), 6);
        assert_eq!(
            f.custody.account_authority(reserve.liquidity_supply).unwrap(),
            Some(market.address)
        );
        assert_eq!(f.custody.supply_of(reserve.collateral_mint).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_init_reserve_requires_market() {
        let f = fixture();
        let missing = Address::from_label("nowhere");

        let err = f.program.init_reserve(f.owner, missing, f.usdc).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MarketNotFound);
        assert_eq!(f.store.reserve_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_inits_leave_no_locks() {
        let f = fixture();
        let market = f.program.init_lending_market(f.owner).await.unwrap();

        for i in 0..200 {
            let bogus = Address::from_label(&format!("market-{}", i));
            let err = f.program.init_reserve(f.owner, bogus, f.usdc).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MarketNotFound);

            let reserve = Address::from_label(&format!("reserve-{}", i));
            let err = f.program.init_obligation(f.owner, market.address, reserve).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReserveNotFound);
        }

        assert_eq!(f.store.locks().tracked_keys(), 0);
        assert_eq!(f.store.reserve_count(), 0);
        assert_eq!(f.store.obligation_count(), 0);
    }

    #[tokio::test]
    async fn test_init_obligation_requires_reserve() {
        let f = fixture();
        let market = f.program.init_lending_market(f.owner).await.unwrap();

        let err = f
            .program
            .init_obligation(f.owner, market.address, Address::from_label("nothing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReserveNotFound);
    }

    #[tokio::test]
    async fn test_supply_moves_tokens() {
        let f = fixture();
        let (_, reserve, obligation) = open(&f).await;

        let receipt = f.program.supply(f.owner, obligation.address, 200).await.unwrap();
        assert_eq!(receipt.collateral_amount, 200);
        assert!(!receipt.is_clamped());

        assert_eq!(f.custody.balance_of(f.usdc, f.owner).await.unwrap(), 800);
        assert_eq!(f.custody.balance_of(f.usdc, reserve.liquidity_supply).await.unwrap(), 200);
        assert_eq!(
            f.custody.balance_of(reserve.collateral_mint, reserve.collateral_supply).await.unwrap(),
            200
        );
    }

    #[tokio::test]
    async fn test_stranger_cannot_act_on_obligation() {
        let f = fixture();
        let (_, _, obligation) = open(&f).await;
        let stranger = Address::from_label("stranger");
        f.custody.airdrop(f.usdc, stranger, 100).unwrap();

        let err = f.program.supply(stranger, obligation.address, 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(f.custody.balance_of(f.usdc, stranger).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_supply_without_funds_leaves_no_trace() {
        let f = fixture();
        let (_, reserve, obligation) = open(&f).await;
        let events_before = f.store.event_count();

        let err = f.program.supply(f.owner, obligation.address, 1_001).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let reserve = f.program.reserve(reserve.address).await.unwrap().unwrap();
        assert_eq!(reserve.total_liquidity_supplied, 0);
        assert_eq!(f.store.event_count(), events_before);
    }

    #[tokio::test]
    async fn test_max_borrowable_tracks_debt() {
        let f = fixture();
        let (_, _, obligation) = open(&f).await;

        f.program.supply(f.owner, obligation.address, 200).await.unwrap();
        assert_eq!(f.program.max_borrowable(obligation.address).await.unwrap(), 100);

        f.program.borrow(f.owner, obligation.address, 60).await.unwrap();
        assert_eq!(f.program.max_borrowable(obligation.address).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_repay_without_debt() {
        let f = fixture();
        let (_, _, obligation) = open(&f).await;
        f.program.supply(f.owner, obligation.address, 200).await.unwrap();

        let err = f.program.repay(f.owner, obligation.address, 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDebt);
    }

    #[tokio::test]
    async fn test_overpayment_emits_event() {
        let f = fixture();
        let (_, _, obligation) = open(&f).await;
        f.program.supply(f.owner, obligation.address, 200).await.unwrap();
        f.program.borrow(f.owner, obligation.address, 50).await.unwrap();

        let receipt = f.program.repay(f.owner, obligation.address, 80).await.unwrap();
        assert_eq!(receipt.liquidity_amount, 50);
        assert_eq!(receipt.overpayment, Some(Overpayment { requested: 80, repaid: 50 }));

        let events = f.store.events().find_by_subject(obligation.address).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event.event_type()).collect();
        assert_eq!(types.last(), Some(&"overpayment_clamped"));
    }

    #[tokio::test]
    async fn test_unknown_obligation() {
        let f = fixture();
        let err = f
            .program
            .borrow(f.owner, Address::from_label("ghost"), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
