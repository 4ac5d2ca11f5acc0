//! Integration test: full block lifecycle through the market keeper.
//!
//! Orders go in through `place_order`, blocks are finalized with
//! `on_block_end`, and the resulting events, book and balances are checked.

use chainbook_keeper::{MarketKeeper, NewOrder};
use chainbook_matchcore::tie_break_hash;
use chainbook_settlement::{BankKeeper, InMemoryBank, StaticAssetPolicy};
use chainbook_types::*;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn addr(user: &str) -> Address {
    Address::new(user)
}

fn pair() -> TradingPair {
    TradingPair::new("abc", "cet")
}

/// Block `height` at noon of January `day`.
fn block(height: u64, day: u32) -> BlockContext {
    BlockContext::new(
        height,
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        format!("block-{height}").into_bytes(),
    )
}

fn funded_bank() -> InMemoryBank {
    let mut bank = InMemoryBank::new();
    for user in USERS {
        bank.deposit(&addr(user), "cet", dec(1_000_000));
        bank.deposit(&addr(user), "abc", dec(10_000));
    }
    bank
}

fn keeper_with(params: MarketParams, reference: i64) -> MarketKeeper<InMemoryBank, StaticAssetPolicy> {
    init_tracing();
    let mut keeper = MarketKeeper::new(funded_bank(), StaticAssetPolicy::new(), params).unwrap();
    keeper.create_market("abc", "cet", 2, dec(reference)).unwrap();
    keeper
}

fn keeper(reference: i64) -> MarketKeeper<InMemoryBank, StaticAssetPolicy> {
    keeper_with(MarketParams::default(), reference)
}

fn buy(user: &str, seq: u64, price: i64, qty: i64) -> NewOrder {
    NewOrder::limit(addr(user), seq, pair(), OrderSide::Buy, dec(price), dec(qty))
}

fn sell(user: &str, seq: u64, price: i64, qty: i64) -> NewOrder {
    NewOrder::limit(addr(user), seq, pair(), OrderSide::Sell, dec(price), dec(qty))
}

// =====================================================================
// Worked examples
// =====================================================================

#[test]
fn example_one_clears_at_max_volume_then_min_imbalance() {
    let mut k = keeper(100);
    k.place_order(5, buy("alice", 1, 100, 150)).unwrap();
    let resting = k.place_order(5, buy("carol", 1, 98, 100)).unwrap();
    k.place_order(5, sell("bob", 1, 98, 100)).unwrap();
    k.place_order(5, sell("dave", 1, 97, 50)).unwrap();

    let report = k.on_block_end(&block(5, 1)).unwrap();
    assert!(!report.expiry_sweep);
    // 100 and 98 both execute 150; 100 has zero imbalance.
    assert_eq!(report.clearing_price(&pair()), Some(dec(100)));

    let fills: Vec<&FillEvent> = report.fills().collect();
    assert_eq!(fills.len(), 2);
    assert_eq!((fills[0].seller.as_str(), fills[0].quantity), ("dave", dec(50)));
    assert_eq!((fills[1].seller.as_str(), fills[1].quantity), ("bob", dec(100)));
    assert!(fills.iter().all(|f| f.price == dec(100)));
    assert!(report.cancels().all(|c| c.reason == CancelReason::Filled));

    let book = k.orders_of_pair("abc/cet").unwrap();
    assert_eq!(book, vec![resting]);

    let bank = k.bank();
    assert_eq!(bank.balance(&addr("alice"), "abc").available, dec(10_150));
    assert_eq!(bank.balance(&addr("alice"), "cet").frozen, Decimal::ZERO);
    assert_eq!(bank.balance(&addr("bob"), "cet").available, dec(1_010_000));
    assert_eq!(bank.balance(&addr("dave"), "cet").available, dec(1_005_000));
    assert_eq!(bank.balance(&addr("carol"), "cet").frozen, dec(9_800));
    bank.verify_all().unwrap();

    assert_eq!(k.market("abc/cet").unwrap().last_executed_price, dec(100));
}

#[test]
fn example_two_uncrossed_book_is_left_alone() {
    let mut k = keeper(100);
    k.place_order(5, buy("alice", 1, 97, 10)).unwrap();
    k.place_order(5, sell("bob", 1, 98, 10)).unwrap();

    let report = k.on_block_end(&block(5, 1)).unwrap();
    assert!(report.events.is_empty());
    assert!(report.clearing_prices.is_empty());
    assert_eq!(k.all_orders().unwrap().len(), 2);
    assert_eq!(k.market("abc/cet").unwrap().last_executed_price, dec(100));
}

#[test]
fn example_three_ioc_remainder_released() {
    let mut k = keeper(100);
    let ioc = k.place_order(7, buy("alice", 1, 100, 100).ioc()).unwrap();
    k.place_order(7, sell("bob", 1, 100, 60)).unwrap();

    let report = k.on_block_end(&block(7, 1)).unwrap();
    assert_eq!(report.fills().map(|f| f.quantity).sum::<Decimal>(), dec(60));

    let cancel = report.cancels().find(|c| c.order_id == ioc.id).unwrap();
    assert_eq!(cancel.reason, CancelReason::IocUnfilled);
    assert_eq!(cancel.left_quantity, dec(40));
    assert_eq!(cancel.deal_quantity, dec(60));
    assert_eq!(cancel.released, Coin::new("cet", dec(4_000)));

    let alice = k.bank().balance(&addr("alice"), "cet");
    assert_eq!(alice.frozen, Decimal::ZERO);
    assert_eq!(alice.available, dec(994_000));
    assert!(k.all_orders().unwrap().is_empty());
}

#[test]
fn example_four_gte_expires_on_daily_sweep() {
    let params = MarketParams {
        gte_order_lifetime: 500,
        ..MarketParams::default()
    };
    let mut k = keeper_with(params, 100);
    let old = k.place_order(1000, buy("alice", 1, 50, 1)).unwrap();
    k.on_block_end(&block(1000, 1)).unwrap();

    // New day, but 1000 is not yet older than 1499 - 500.
    let report = k.on_block_end(&block(1499, 2)).unwrap();
    assert!(report.expiry_sweep);
    assert!(report.events.is_empty());
    assert!(k.order(&old.id).is_ok());

    let young = k.place_order(1499, buy("alice", 2, 50, 1)).unwrap();
    let report = k.on_block_end(&block(1500, 3)).unwrap();
    assert!(report.expiry_sweep);
    let cancels: Vec<&CancelEvent> = report.cancels().collect();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].order_id, old.id);
    assert_eq!(cancels[0].reason, CancelReason::Expired);
    assert_eq!(cancels[0].released, Coin::new("cet", dec(50)));

    assert!(matches!(k.order(&old.id), Err(ChainbookError::OrderNotFound(_))));
    assert!(k.order(&young.id).is_ok());
    assert_eq!(k.bank().balance(&addr("alice"), "cet").frozen, dec(50));
}

#[test]
fn example_five_hash_breaks_price_and_height_ties() {
    for round in 0..8u64 {
        let mut k = keeper(100);
        let alice = k.place_order(3, buy("alice", 1, 100, 10)).unwrap();
        let carol = k.place_order(3, buy("carol", 1, 100, 10)).unwrap();
        k.place_order(3, sell("bob", 1, 100, 10)).unwrap();

        let ctx = BlockContext::new(3, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), round.to_be_bytes().to_vec());
        let (winner, loser) = if tie_break_hash(alice.id.as_str(), &ctx.data_hash)
            < tie_break_hash(carol.id.as_str(), &ctx.data_hash)
        {
            (alice, carol)
        } else {
            (carol, alice)
        };

        let report = k.on_block_end(&ctx).unwrap();
        let fills: Vec<&FillEvent> = report.fills().collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].bid_order_id, winner.id);
        assert_eq!(k.order(&loser.id).unwrap().left_quantity, dec(10));
    }
}

// =====================================================================
// Policy skips
// =====================================================================

#[test]
fn forbidden_owner_is_excluded_but_kept() {
    let mut k = keeper(100);
    k.place_order(2, buy("alice", 1, 100, 10)).unwrap();
    k.place_order(2, sell("bob", 1, 100, 10)).unwrap();
    k.policy_mut().forbid("abc", &addr("bob"));

    let report = k.on_block_end(&block(2, 1)).unwrap();
    assert_eq!(report.fills().count(), 0);
    assert_eq!(k.all_orders().unwrap().len(), 2);

    k.policy_mut().allow("abc", &addr("bob"));
    let report = k.on_block_end(&block(3, 1)).unwrap();
    assert_eq!(report.fills().count(), 1);
    assert!(k.all_orders().unwrap().is_empty());
}

#[test]
fn frozen_token_skips_pair() {
    let mut k = keeper(100);
    k.place_order(2, buy("alice", 1, 100, 10)).unwrap();
    k.place_order(2, sell("bob", 1, 100, 10)).unwrap();
    k.policy_mut().freeze_token("abc");

    let report = k.on_block_end(&block(2, 1)).unwrap();
    assert!(report.events.is_empty());
    assert_eq!(k.all_orders().unwrap().len(), 2);

    k.policy_mut().unfreeze_token("abc");
    let report = k.on_block_end(&block(3, 1)).unwrap();
    assert_eq!(report.clearing_price(&pair()), Some(dec(100)));
}

#[test]
fn ioc_without_counterparty_leaves_with_its_block() {
    let mut k = keeper(100);
    let ioc = k.place_order(4, buy("alice", 1, 90, 5).ioc()).unwrap();
    let gte = k.place_order(4, buy("alice", 2, 90, 5)).unwrap();

    let report = k.on_block_end(&block(4, 1)).unwrap();
    let cancels: Vec<&CancelEvent> = report.cancels().collect();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].order_id, ioc.id);
    assert_eq!(cancels[0].reason, CancelReason::IocUnfilled);
    assert_eq!(k.all_orders().unwrap(), vec![gte]);
}

#[test]
fn expiry_block_skips_matching() {
    let mut k = keeper(100);
    k.on_block_end(&block(1, 1)).unwrap();
    k.place_order(2, buy("alice", 1, 100, 10)).unwrap();
    k.place_order(2, sell("bob", 1, 100, 10)).unwrap();

    let report = k.on_block_end(&block(2, 2)).unwrap();
    assert!(report.expiry_sweep);
    assert_eq!(report.fills().count(), 0);

    let report = k.on_block_end(&block(3, 2)).unwrap();
    assert!(!report.expiry_sweep);
    assert_eq!(report.fills().count(), 1);
}

// =====================================================================
// Delisting
// =====================================================================

#[test]
fn delisting_removes_every_order_and_the_market() {
    let mut k = keeper(100);
    k.place_order(8, buy("alice", 1, 90, 1)).unwrap();
    k.place_order(8, sell("bob", 1, 110, 1)).unwrap();
    k.schedule_delist("abc/cet", 10).unwrap();

    let report = k.on_block_end(&block(9, 1)).unwrap();
    assert!(report.events.is_empty());

    // Height 10 has no block; the next one picks the delisting up.
    let report = k.on_block_end(&block(11, 1)).unwrap();
    let cancels: Vec<&CancelEvent> = report.cancels().collect();
    assert_eq!(cancels.len(), 2);
    assert!(cancels.iter().all(|c| c.reason == CancelReason::Delisted));

    assert!(matches!(k.market("abc/cet"), Err(ChainbookError::MarketNotFound(_))));
    assert!(k.all_orders().unwrap().is_empty());
    assert!(matches!(
        k.place_order(12, buy("alice", 2, 90, 1)),
        Err(ChainbookError::MarketNotFound(_))
    ));
    assert_eq!(k.bank().total_frozen("cet"), Decimal::ZERO);
    assert_eq!(k.bank().total_frozen("abc"), Decimal::ZERO);
    k.bank().verify_all().unwrap();

    let report = k.on_block_end(&block(12, 1)).unwrap();
    assert!(report.events.is_empty());
}

// =====================================================================
// Custody failure
// =====================================================================

/// Bank whose transfers can be switched off.
#[derive(Debug, Clone, Default)]
struct FlakyBank {
    inner: InMemoryBank,
    reject_transfers: bool,
}

impl BankKeeper for FlakyBank {
    fn freeze(&mut self, owner: &Address, coin: &Coin) -> Result<()> {
        self.inner.freeze(owner, coin)
    }

    fn unfreeze(&mut self, owner: &Address, coin: &Coin) -> Result<()> {
        self.inner.unfreeze(owner, coin)
    }

    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<()> {
        if self.reject_transfers {
            return Err(ChainbookError::Internal("transfers disabled".into()));
        }
        self.inner.transfer(from, to, coin)
    }
}

#[test]
fn custody_failure_aborts_and_restores_block() {
    init_tracing();
    let bank = FlakyBank {
        inner: funded_bank(),
        reject_transfers: false,
    };
    let mut k = MarketKeeper::new(bank, StaticAssetPolicy::new(), MarketParams::default()).unwrap();
    k.create_market("abc", "cet", 2, dec(100)).unwrap();
    k.place_order(3, buy("alice", 1, 100, 10)).unwrap();
    k.place_order(3, sell("bob", 1, 100, 10)).unwrap();
    let alice_before = k.bank().inner.balance(&addr("alice"), "cet");
    let bob_before = k.bank().inner.balance(&addr("bob"), "abc");

    k.bank_mut().reject_transfers = true;
    let err = k.on_block_end(&block(3, 1)).unwrap_err();
    assert!(matches!(err, ChainbookError::Custody { op: "transfer", .. }));
    assert!(err.is_block_fatal());

    assert_eq!(k.all_orders().unwrap().len(), 2);
    assert_eq!(k.bank().inner.balance(&addr("alice"), "cet"), alice_before);
    assert_eq!(k.bank().inner.balance(&addr("bob"), "abc"), bob_before);
    assert_eq!(k.market("abc/cet").unwrap().last_executed_price, dec(100));

    k.bank_mut().reject_transfers = false;
    let report = k.on_block_end(&block(3, 1)).unwrap();
    assert_eq!(report.fills().count(), 1);
    k.bank().inner.verify_all().unwrap();
}

// =====================================================================
// Report export
// =====================================================================

#[test]
fn report_survives_json_round_trip() {
    let mut k = keeper(100);
    k.place_order(5, buy("alice", 1, 101, 3)).unwrap();
    k.place_order(5, sell("bob", 1, 99, 2)).unwrap();
    let report = k.on_block_end(&block(5, 1)).unwrap();

    let json = serde_json::to_string(&report).unwrap();
    let back: BlockReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.event_root, report.event_root);
    assert_eq!(back.events, report.events);
    assert_eq!(back.clearing_prices, report.clearing_prices);
}
