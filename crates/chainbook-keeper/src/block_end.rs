//! Block-end cycle.
//!
//! Runs once per block, after all transactions:
//!
//! 1. First block of a new day: expiry sweep of old GTE orders on every
//!    pair, no matching
//! 2. Otherwise: match every pair whose tokens are not frozen
//! 3. Remove IOC orders created in this block
//! 4. Process delistings due at this height
//!
//! Filled and underfunded orders leave the book inside each matching pass.
//!
//! ## Failure policy
//!
//! A state error on one pair (missing order, corrupt entry, overflow)
//! rolls back that pair's failing step and is reported as a
//! [`PairFailure`]; other pairs proceed. A custody error aborts the block:
//! store and bank are restored to their state at block start.

use chainbook_matchcore::{MatchInput, MatchOutcome, PriceBand, compute_event_root, match_orders};
use chainbook_settlement::{AssetPolicy, BankKeeper, SettlementAdapter};
use chainbook_store::{MarketStore, OrderIndex};
use chainbook_types::{
    BlockContext, BlockEvent, BlockReport, CancelReason, ClearingRecord, MarketInfo, Order,
    PairFailure, Result, TradingPair,
};
use rust_decimal::Decimal;

use crate::keeper::{MarketKeeper, cancel_event};

/// Events and per-pair results collected while a block is processed.
#[derive(Debug, Default)]
struct BlockState {
    events: Vec<BlockEvent>,
    clearing_prices: Vec<ClearingRecord>,
    failures: Vec<PairFailure>,
    fill_seq: u64,
}

impl BlockState {
    /// Turn a pair-local error into a recorded failure; pass fatal ones on.
    fn isolate<T>(&mut self, pair: &TradingPair, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_block_fatal() => Err(err),
            Err(err) => {
                tracing::warn!(pair = %pair, error = %err, "pair skipped for this block");
                self.failures.push(PairFailure {
                    pair: pair.clone(),
                    reason: err.to_string(),
                });
                Ok(None)
            }
        }
    }
}

impl<B: BankKeeper + Clone, P: AssetPolicy> MarketKeeper<B, P> {
    /// Finalize block `ctx`: sweep, match, clean up and delist.
    pub fn on_block_end(&mut self, ctx: &BlockContext) -> Result<BlockReport> {
        let store_checkpoint = self.store.checkpoint();
        let bank_checkpoint = self.bank.clone();

        match self.run_block(ctx) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.store.restore(store_checkpoint);
                self.bank = bank_checkpoint;
                tracing::error!(height = ctx.height, error = %err, "block aborted, state restored");
                Err(err)
            }
        }
    }

    fn run_block(&mut self, ctx: &BlockContext) -> Result<BlockReport> {
        let expiry_sweep = MarketStore::advance_day(&mut self.store, ctx.day())?;
        let markets = MarketStore::all(&self.store)?;
        let mut state = BlockState::default();

        if expiry_sweep {
            tracing::info!(height = ctx.height, day = ctx.day(), "daily expiry sweep");
            for market in &markets {
                let result = self.sweep_expired(ctx.height, &market.pair, &mut state);
                state.isolate(&market.pair, result)?;
            }
        } else {
            for market in &markets {
                if self.is_pair_frozen(&market.pair) {
                    tracing::warn!(pair = %market.pair, "token frozen by issuer, pair not matched");
                    continue;
                }
                // Passes settled before a failing one keep their price.
                let mut traded_at = None;
                let result = self.match_pair(ctx, market, &mut traded_at, &mut state);
                state.isolate(&market.pair, result)?;
                if let Some(price) = traded_at {
                    let recorded = self.record_price(market, price, &mut state);
                    state.isolate(&market.pair, recorded)?;
                }
            }
        }

        for market in &markets {
            let result = self.sweep_ioc(ctx.height, &market.pair, &mut state);
            state.isolate(&market.pair, result)?;
        }

        self.process_delistings(ctx.height, &mut state)?;

        let event_root = compute_event_root(&state.events);
        tracing::info!(
            height = ctx.height,
            expiry_sweep,
            events = state.events.len(),
            pairs_traded = state.clearing_prices.len(),
            failures = state.failures.len(),
            event_root = %hex::encode(event_root),
            "block finalized"
        );

        Ok(BlockReport {
            height: ctx.height,
            expiry_sweep,
            events: state.events,
            event_root,
            clearing_prices: state.clearing_prices,
            failures: state.failures,
        })
    }

    // =================================================================
    // Matching
    // =================================================================

    /// Match one pair until no pass flags underfunded orders.
    ///
    /// `traded_at` receives the clearing price of every settled pass that
    /// executed fills, so it survives an error in a later pass.
    fn match_pair(
        &mut self,
        ctx: &BlockContext,
        market: &MarketInfo,
        traded_at: &mut Option<Decimal>,
        state: &mut BlockState,
    ) -> Result<()> {
        let index = OrderIndex::new(&market.pair);
        let band = PriceBand::around(market.last_executed_price, self.params.price_band_ratio())?;

        loop {
            let candidates = index.matching_candidates(&self.store)?;
            if candidates.is_empty() {
                break;
            }
            let bids = self.tradable(&market.pair, candidates.bids);
            let asks = self.tradable(&market.pair, candidates.asks);

            let input = MatchInput {
                pair: &market.pair,
                height: ctx.height,
                data_hash: &ctx.data_hash,
                band,
                fill_seq_start: state.fill_seq,
            };
            let outcome = match_orders(&input, bids, asks)?;
            if outcome.is_empty() {
                break;
            }
            let clearing_price = outcome.clearing_price();

            // Index first: a state error here leaves custody untouched.
            let checkpoint = self.store.checkpoint();
            if let Err(err) = persist_outcome(&index, &mut self.store, &outcome) {
                self.store.restore(checkpoint);
                return Err(err);
            }
            let flagged = outcome.insufficient_funds_count();
            let filled = outcome.fills.len();
            self.settle_outcome(ctx.height, outcome, state)?;

            tracing::debug!(
                pair = %market.pair,
                clearing_price = ?clearing_price,
                fills = filled,
                flagged,
                "matching pass"
            );
            if let Some(price) = clearing_price.filter(|p| filled > 0 && !p.is_zero()) {
                *traded_at = Some(price);
            }
            if flagged == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Drop orders whose owner the issuer forbids from trading this pair.
    fn tradable(&self, pair: &TradingPair, orders: Vec<Order>) -> Vec<Order> {
        orders
            .into_iter()
            .filter(|order| {
                let forbidden = self.policy.is_trading_forbidden(&pair.stock, &order.owner)
                    || self.policy.is_trading_forbidden(&pair.money, &order.owner);
                if forbidden {
                    tracing::warn!(order_id = %order.id, owner = %order.owner, "owner forbidden, order excluded from pass");
                }
                !forbidden
            })
            .collect()
    }

    fn is_pair_frozen(&self, pair: &TradingPair) -> bool {
        self.policy.is_token_frozen(&pair.stock) || self.policy.is_token_frozen(&pair.money)
    }

    /// Settle fills, then release custody of orders that left the book.
    fn settle_outcome(&mut self, height: u64, outcome: MatchOutcome, state: &mut BlockState) -> Result<()> {
        let mut adapter = SettlementAdapter::new(&mut self.bank);
        for fill in outcome.fills {
            adapter.settle_fill(&fill)?;
            state.fill_seq += 1;
            state.events.push(BlockEvent::Fill(fill));
        }
        for (order, reason) in outcome.terminal {
            let released = adapter.release(&order)?;
            state
                .events
                .push(BlockEvent::Cancel(cancel_event(height, order, reason, released)));
        }
        Ok(())
    }

    fn record_price(&mut self, market: &MarketInfo, price: Decimal, state: &mut BlockState) -> Result<()> {
        let mut updated = market.clone();
        updated.last_executed_price = price;
        MarketStore::set(&mut self.store, &updated)?;
        tracing::info!(pair = %market.pair, clearing_price = %price, "pair cleared");
        state.clearing_prices.push(ClearingRecord {
            pair: market.pair.clone(),
            price,
        });
        Ok(())
    }

    // =================================================================
    // Sweeps
    // =================================================================

    /// Remove GTE orders created at or before `height - gte_order_lifetime`.
    fn sweep_expired(&mut self, height: u64, pair: &TradingPair, state: &mut BlockState) -> Result<()> {
        let Some(cutoff) = height.checked_sub(self.params.gte_order_lifetime) else {
            return Ok(());
        };
        let index = OrderIndex::new(pair);
        let expired: Vec<Order> = index
            .older_than(&self.store, cutoff.saturating_add(1))?
            .into_iter()
            .filter(|order| !order.is_ioc())
            .collect();
        if !expired.is_empty() {
            tracing::info!(pair = %pair, count = expired.len(), cutoff, "expiring orders");
        }
        self.remove_orders(height, &index, expired, CancelReason::Expired, state)
    }

    /// Remove IOC orders created in this block that are still resting.
    fn sweep_ioc(&mut self, height: u64, pair: &TradingPair, state: &mut BlockState) -> Result<()> {
        let index = OrderIndex::new(pair);
        let leftovers: Vec<Order> = index
            .at_height(&self.store, height)?
            .into_iter()
            .filter(Order::is_ioc)
            .collect();
        self.remove_orders(height, &index, leftovers, CancelReason::IocUnfilled, state)
    }

    fn process_delistings(&mut self, height: u64, state: &mut BlockState) -> Result<()> {
        for (scheduled, symbol) in MarketStore::due_delistings(&self.store, height)? {
            let Some(market) = MarketStore::get(&self.store, &symbol)? else {
                MarketStore::clear_delisting(&mut self.store, scheduled, &symbol);
                continue;
            };
            let result = self.delist(height, &market.pair, state);
            if state.isolate(&market.pair, result)?.is_some() {
                MarketStore::remove(&mut self.store, &symbol);
                MarketStore::clear_delisting(&mut self.store, scheduled, &symbol);
                tracing::info!(pair = %symbol, scheduled, height, "market delisted");
            }
        }
        Ok(())
    }

    fn delist(&mut self, height: u64, pair: &TradingPair, state: &mut BlockState) -> Result<()> {
        let index = OrderIndex::new(pair);
        let orders = index.all_orders(&self.store)?;
        self.remove_orders(height, &index, orders, CancelReason::Delisted, state)
    }

    /// Unindex `orders`, then release their custody.
    ///
    /// Index removal happens first so a state error rolls back cleanly
    /// before any custody moved.
    fn remove_orders(
        &mut self,
        height: u64,
        index: &OrderIndex,
        orders: Vec<Order>,
        reason: CancelReason,
        state: &mut BlockState,
    ) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let checkpoint = self.store.checkpoint();
        for order in &orders {
            if let Err(err) = index.remove(&mut self.store, &order.id) {
                self.store.restore(checkpoint);
                return Err(err);
            }
        }

        let mut adapter = SettlementAdapter::new(&mut self.bank);
        for order in orders {
            let released = adapter.release(&order)?;
            tracing::debug!(order_id = %order.id, reason = %reason, released = %released, "order removed");
            state
                .events
                .push(BlockEvent::Cancel(cancel_event(height, order, reason, released)));
        }
        Ok(())
    }
}

/// Write one pass's order changes back to the index.
fn persist_outcome(index: &OrderIndex, store: &mut chainbook_store::KvStore, outcome: &MatchOutcome) -> Result<()> {
    for (order, _) in &outcome.terminal {
        index.remove(store, &order.id)?;
    }
    for order in &outcome.updated {
        index.update(store, order)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chainbook_settlement::{InMemoryBank, StaticAssetPolicy};
    use chainbook_store::{WriteBatch, keys};
    use chainbook_types::{Address, ChainbookError, Coin, MarketParams, OrderId, OrderSide};
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::NewOrder;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn ctx(height: u64) -> BlockContext {
        BlockContext::new(height, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(), b"unit".to_vec())
    }

    fn keeper() -> MarketKeeper<InMemoryBank, StaticAssetPolicy> {
        let mut bank = InMemoryBank::new();
        for user in ["alice", "bob", "carol"] {
            bank.deposit(&Address::new(user), "cet", d(10_000));
            bank.deposit(&Address::new(user), "abc", d(100));
            bank.deposit(&Address::new(user), "xyz", d(100));
        }
        let mut k = MarketKeeper::new(bank, StaticAssetPolicy::new(), MarketParams::default()).unwrap();
        k.create_market("abc", "cet", 2, Decimal::ZERO).unwrap();
        k
    }

    fn order(owner: &str, seq: u64, stock: &str, side: OrderSide, price: i64, qty: i64) -> NewOrder {
        NewOrder::limit(Address::new(owner), seq, TradingPair::new(stock, "cet"), side, d(price), d(qty))
    }

    /// Forbids one owner for a fixed number of checks, then lets them trade.
    #[derive(Debug, Default)]
    struct ThawingPolicy {
        owner: Option<Address>,
        checks_left: Cell<u32>,
    }

    impl AssetPolicy for ThawingPolicy {
        fn is_trading_forbidden(&self, _denom: &str, owner: &Address) -> bool {
            let left = self.checks_left.get();
            if self.owner.as_ref() != Some(owner) || left == 0 {
                return false;
            }
            self.checks_left.set(left - 1);
            true
        }
    }

    #[test]
    fn underfunded_bid_is_dropped_and_others_trade() {
        let mut k = keeper();
        let alice = Address::new("alice");
        let mut short = k.place_order(1, order("alice", 1, "abc", OrderSide::Buy, 105, 10)).unwrap();

        // Custody shrank behind the book's back.
        short.frozen_amount = d(500);
        OrderIndex::new(&short.pair).update(&mut k.store, &short).unwrap();
        k.bank.unfreeze(&alice, &Coin::new("cet", d(550))).unwrap();

        k.place_order(1, order("carol", 1, "abc", OrderSide::Buy, 100, 10)).unwrap();
        k.place_order(1, order("bob", 1, "abc", OrderSide::Sell, 100, 10)).unwrap();

        let report = k.on_block_end(&ctx(2)).unwrap();
        let pair = TradingPair::new("abc", "cet");
        assert_eq!(report.clearing_price(&pair), Some(d(100)));

        let fills: Vec<_> = report.fills().collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].buyer, Address::new("carol"));

        let dropped = report
            .cancels()
            .find(|c| c.order_id == short.id)
            .unwrap();
        assert_eq!(dropped.reason, CancelReason::InsufficientFunds);
        assert_eq!(dropped.released, Coin::new("cet", d(500)));

        let balance = k.bank().balance(&alice, "cet");
        assert_eq!(balance.available, d(10_000));
        assert_eq!(balance.frozen, Decimal::ZERO);
        assert!(k.all_orders().unwrap().is_empty());
        assert_eq!(k.market("abc/cet").unwrap().last_executed_price, d(100));
        k.bank().verify_all().unwrap();
    }

    #[test]
    fn underfunded_volume_does_not_block_ioc_fill() {
        let mut k = keeper();
        let alice = Address::new("alice");
        let mut short = k.place_order(1, order("alice", 1, "abc", OrderSide::Buy, 101, 10)).unwrap();

        short.frozen_amount = d(10);
        OrderIndex::new(&short.pair).update(&mut k.store, &short).unwrap();
        k.bank.unfreeze(&alice, &Coin::new("cet", d(1_000))).unwrap();

        let ioc = k.place_order(1, order("carol", 1, "abc", OrderSide::Buy, 100, 10).ioc()).unwrap();
        k.place_order(1, order("bob", 1, "abc", OrderSide::Sell, 100, 10)).unwrap();

        let report = k.on_block_end(&ctx(2)).unwrap();
        assert_eq!(report.clearing_price(&TradingPair::new("abc", "cet")), Some(d(100)));

        let fills: Vec<_> = report.fills().collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].bid_order_id, ioc.id);
        assert_eq!(fills[0].quantity, d(10));

        let reason_of = |id: &OrderId| report.cancels().find(|c| &c.order_id == id).map(|c| c.reason);
        assert_eq!(reason_of(&ioc.id), Some(CancelReason::Filled));
        assert_eq!(reason_of(&short.id), Some(CancelReason::InsufficientFunds));
        assert!(k.all_orders().unwrap().is_empty());
        k.bank().verify_all().unwrap();
    }

    #[test]
    fn failed_later_pass_keeps_earlier_price() {
        let whale = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let tick = Decimal::new(1, 4);
        let mut bank = InMemoryBank::new();
        for user in ["alice", "dave"] {
            bank.deposit(&Address::new(user), "cet", whale * tick);
        }
        bank.deposit(&Address::new("dave"), "big", d(1));
        bank.deposit(&Address::new("bob"), "big", d(1));
        bank.deposit(&Address::new("carol"), "cet", d(1));
        let mut k = MarketKeeper::new(bank, ThawingPolicy::default(), MarketParams::default()).unwrap();
        k.create_market("big", "cet", 4, Decimal::ZERO).unwrap();
        let pair = TradingPair::new("big", "cet");
        let place = |k: &mut MarketKeeper<InMemoryBank, ThawingPolicy>, owner: &str, seq, side, price, qty| {
            k.place_order(1, NewOrder::limit(Address::new(owner), seq, pair.clone(), side, price, qty))
                .unwrap()
        };

        place(&mut k, "alice", 1, OrderSide::Buy, tick, whale);
        place(&mut k, "dave", 1, OrderSide::Buy, tick, whale);
        place(&mut k, "bob", 1, OrderSide::Sell, tick, d(1));
        place(&mut k, "dave", 2, OrderSide::Sell, tick, d(1));
        let mut short = place(&mut k, "carol", 1, OrderSide::Buy, tick * d(2), d(1));
        short.frozen_amount = Decimal::ZERO;
        OrderIndex::new(&pair).update(&mut k.store, &short).unwrap();
        k.bank.unfreeze(&Address::new("carol"), &Coin::new("cet", tick * d(2))).unwrap();

        // Dave sits out the first pass only. The dropped short bid forces a
        // second pass, where both whale bids together overflow the volume.
        k.policy_mut().owner = Some(Address::new("dave"));
        k.policy_mut().checks_left.set(2);

        let report = k.on_block_end(&ctx(2)).unwrap();
        let fills: Vec<_> = report.fills().collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, tick);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pair, pair);
        assert!(report.failures[0].reason.contains("CB_ERR_500"));

        assert_eq!(report.clearing_price(&pair), Some(tick));
        assert_eq!(k.market("big/cet").unwrap().last_executed_price, tick);
        k.bank().verify_all().unwrap();
    }

    #[test]
    fn corrupt_pair_fails_alone() {
        let mut k = keeper();
        k.create_market("xyz", "cet", 2, Decimal::ZERO).unwrap();

        let broken = k.place_order(1, order("alice", 1, "xyz", OrderSide::Buy, 10, 1)).unwrap();
        k.place_order(1, order("bob", 1, "xyz", OrderSide::Sell, 10, 1)).unwrap();
        let mut batch = WriteBatch::new();
        batch.delete(keys::order_key(&broken.id));
        k.store.write(batch);

        k.place_order(1, order("alice", 2, "abc", OrderSide::Buy, 100, 1)).unwrap();
        k.place_order(1, order("bob", 2, "abc", OrderSide::Sell, 100, 1)).unwrap();

        let report = k.on_block_end(&ctx(2)).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pair, TradingPair::new("xyz", "cet"));
        assert!(report.failures[0].reason.contains("CB_ERR_402"));
        assert_eq!(report.clearing_price(&TradingPair::new("abc", "cet")), Some(d(100)));
        assert_eq!(report.fills().count(), 1);
    }

    #[test]
    fn fatal_errors_are_not_isolated() {
        let mut state = BlockState::default();
        let pair = TradingPair::new("abc", "cet");

        let fatal: Result<()> = Err(ChainbookError::Custody {
            op: "transfer",
            reason: "bank disagrees".into(),
        });
        assert!(state.isolate(&pair, fatal).is_err());
        assert!(state.failures.is_empty());

        let local: Result<()> = Err(ChainbookError::OrderNotFound(chainbook_types::OrderId("x-0".into())));
        assert_eq!(state.isolate(&pair, local).unwrap(), None);
        assert_eq!(state.failures.len(), 1);
    }
}
