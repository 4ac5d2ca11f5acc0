//! The market keeper: owner of the order book state.
//!
//! Transaction-time operations (create market, place and cancel orders,
//! schedule delistings) live here. The block-end cycle is in
//! [`crate::block_end`].

use chainbook_settlement::{AssetPolicy, BankKeeper, SettlementAdapter};
use chainbook_store::{GlobalOrderLookup, KvStore, MarketStore, OrderIndex};
use chainbook_types::{
    Address, CancelEvent, CancelReason, ChainbookError, Coin, MarketInfo, MarketParams, Order,
    OrderId, Result, TradingPair,
};
use rust_decimal::Decimal;

use crate::msg::NewOrder;

/// Order book state plus the collaborators it needs.
///
/// The bank must be `Clone` so a failed block can be rolled back together
/// with the store.
#[derive(Debug)]
pub struct MarketKeeper<B, P> {
    pub(crate) store: KvStore,
    pub(crate) bank: B,
    pub(crate) policy: P,
    pub(crate) params: MarketParams,
}

impl<B: BankKeeper + Clone, P: AssetPolicy> MarketKeeper<B, P> {
    /// Create a keeper with an empty store.
    pub fn new(bank: B, policy: P, params: MarketParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            store: KvStore::new(),
            bank,
            policy,
            params,
        })
    }

    // =================================================================
    // Accessors
    // =================================================================

    #[must_use]
    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    #[must_use]
    pub fn store(&self) -> &KvStore {
        &self.store
    }

    #[must_use]
    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    // =================================================================
    // Markets
    // =================================================================

    /// Register a trading pair.
    pub fn create_market(
        &mut self,
        stock: &str,
        money: &str,
        price_precision: u32,
        initial_price: Decimal,
    ) -> Result<MarketInfo> {
        let invalid = |reason: String| Err(ChainbookError::InvalidMarket { reason });
        for denom in [stock, money] {
            if denom.is_empty() || denom.contains('/') || denom.contains('\0') {
                return invalid(format!("bad denomination {denom:?}"));
            }
        }
        if stock == money {
            return invalid(format!("stock and money are both {stock}"));
        }
        if price_precision > self.params.max_price_precision {
            return invalid(format!(
                "price precision {price_precision} above maximum {}",
                self.params.max_price_precision
            ));
        }
        if initial_price < Decimal::ZERO {
            return invalid(format!("negative initial price {initial_price}"));
        }

        let info = MarketInfo::new(TradingPair::new(stock, money), price_precision, initial_price);
        let symbol = info.symbol();
        if MarketStore::get(&self.store, &symbol)?.is_some() {
            return Err(ChainbookError::DuplicateMarket(symbol));
        }
        MarketStore::set(&mut self.store, &info)?;
        tracing::info!(pair = %symbol, price_precision, initial_price = %initial_price, "market created");
        Ok(info)
    }

    pub fn market(&self, symbol: &str) -> Result<MarketInfo> {
        MarketStore::require(&self.store, symbol)
    }

    pub fn markets(&self) -> Result<Vec<MarketInfo>> {
        MarketStore::all(&self.store)
    }

    /// Delist `symbol` at the end of block `height` (or the first block
    /// after it).
    pub fn schedule_delist(&mut self, symbol: &str, height: u64) -> Result<()> {
        MarketStore::require(&self.store, symbol)?;
        MarketStore::schedule_delist(&mut self.store, symbol, height);
        tracing::info!(pair = %symbol, height, "delisting scheduled");
        Ok(())
    }

    // =================================================================
    // Orders
    // =================================================================

    /// Validate, freeze custody and index a new order created at `height`.
    pub fn place_order(&mut self, height: u64, msg: NewOrder) -> Result<Order> {
        let market = MarketStore::require(&self.store, &msg.pair.symbol())?;
        msg.validate(&market)?;

        for denom in [&msg.pair.stock, &msg.pair.money] {
            if self.policy.is_token_frozen(denom) {
                return Err(ChainbookError::InvalidOrder {
                    reason: format!("token {denom} is frozen"),
                });
            }
            if self.policy.is_trading_forbidden(denom, &msg.owner) {
                return Err(ChainbookError::InvalidOrder {
                    reason: format!("{} may not trade {denom}", msg.owner),
                });
            }
        }

        let id = msg.order_id();
        if GlobalOrderLookup::find(&self.store, &id)?.is_some() {
            return Err(ChainbookError::DuplicateOrder(id));
        }

        let frozen_amount = msg.frozen_amount()?;
        let order = Order {
            id,
            owner: msg.owner,
            pair: msg.pair,
            side: msg.side,
            price: msg.price,
            quantity: msg.quantity,
            left_quantity: msg.quantity,
            frozen_amount,
            time_in_force: msg.time_in_force,
            creation_height: height,
            deal_quantity: Decimal::ZERO,
            deal_amount: Decimal::ZERO,
        };

        let frozen = SettlementAdapter::new(&mut self.bank).freeze_for(&order)?;
        if let Err(err) = OrderIndex::new(&order.pair).add(&mut self.store, &order) {
            SettlementAdapter::new(&mut self.bank).release(&order)?;
            return Err(err);
        }

        tracing::debug!(
            order_id = %order.id,
            side = %order.side,
            price = %order.price,
            quantity = %order.quantity,
            tif = %order.time_in_force,
            frozen = %frozen,
            height,
            "order placed"
        );
        Ok(order)
    }

    /// Remove an order at its owner's request and release its custody.
    pub fn cancel_order(&mut self, height: u64, sender: &Address, id: &OrderId) -> Result<CancelEvent> {
        let order = GlobalOrderLookup::get_by_id(&self.store, id)?;
        if &order.owner != sender {
            return Err(ChainbookError::NotOrderOwner {
                order_id: id.clone(),
                sender: sender.to_string(),
            });
        }

        let checkpoint = self.store.checkpoint();
        OrderIndex::new(&order.pair).remove(&mut self.store, id)?;
        let released = match SettlementAdapter::new(&mut self.bank).release(&order) {
            Ok(released) => released,
            Err(err) => {
                // Custody refused: the order stays in the book.
                self.store.restore(checkpoint);
                return Err(err);
            }
        };
        tracing::debug!(order_id = %id, released = %released, height, "order cancelled");
        Ok(cancel_event(height, order, CancelReason::Manual, released))
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn order(&self, id: &OrderId) -> Result<Order> {
        GlobalOrderLookup::get_by_id(&self.store, id)
    }

    pub fn orders_of(&self, owner: &Address) -> Result<Vec<Order>> {
        GlobalOrderLookup::orders_for_owner(&self.store, owner)
    }

    pub fn order_ids_of(&self, owner: &Address) -> Result<Vec<OrderId>> {
        GlobalOrderLookup::order_ids_for_owner(&self.store, owner)
    }

    /// Every resting order of every pair. Expensive; meant for state export.
    pub fn all_orders(&self) -> Result<Vec<Order>> {
        GlobalOrderLookup::all_orders(&self.store)
    }

    /// Resting orders of one pair, oldest first.
    pub fn orders_of_pair(&self, symbol: &str) -> Result<Vec<Order>> {
        let market = MarketStore::require(&self.store, symbol)?;
        OrderIndex::new(&market.pair).all_orders(&self.store)
    }
}

pub(crate) fn cancel_event(height: u64, order: Order, reason: CancelReason, released: Coin) -> CancelEvent {
    CancelEvent {
        height,
        order_id: order.id,
        owner: order.owner,
        pair: order.pair,
        reason,
        left_quantity: order.left_quantity,
        released,
        deal_quantity: order.deal_quantity,
        deal_amount: order.deal_amount,
    }
}

#[cfg(test)]
mod tests {
    use chainbook_settlement::{InMemoryBank, StaticAssetPolicy};
    use chainbook_types::OrderSide;

    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn keeper() -> MarketKeeper<InMemoryBank, StaticAssetPolicy> {
        let mut bank = InMemoryBank::new();
        bank.deposit(&Address::new("alice"), "cet", d(10_000));
        bank.deposit(&Address::new("bob"), "abc", d(100));
        let mut k = MarketKeeper::new(bank, StaticAssetPolicy::new(), MarketParams::default()).unwrap();
        k.create_market("abc", "cet", 4, Decimal::ZERO).unwrap();
        k
    }

    fn buy(seq: u64, price: i64, qty: i64) -> NewOrder {
        NewOrder::limit(
            Address::new("alice"),
            seq,
            TradingPair::new("abc", "cet"),
            OrderSide::Buy,
            d(price),
            d(qty),
        )
    }

    #[test]
    fn rejects_invalid_params() {
        let params = MarketParams {
            max_executed_price_change_ratio: 150,
            ..MarketParams::default()
        };
        assert!(MarketKeeper::new(InMemoryBank::new(), StaticAssetPolicy::new(), params).is_err());
    }

    #[test]
    fn market_registry() {
        let mut k = keeper();
        assert!(matches!(
            k.create_market("abc", "cet", 4, Decimal::ZERO),
            Err(ChainbookError::DuplicateMarket(_))
        ));
        assert!(matches!(
            k.create_market("abc", "abc", 4, Decimal::ZERO),
            Err(ChainbookError::InvalidMarket { .. })
        ));
        assert!(k.create_market("x/y", "cet", 4, Decimal::ZERO).is_err());
        assert!(k.create_market("xyz", "cet", 19, Decimal::ZERO).is_err());
        k.create_market("xyz", "cet", 2, d(5)).unwrap();
        assert_eq!(k.markets().unwrap().len(), 2);
        assert_eq!(k.market("xyz/cet").unwrap().last_executed_price, d(5));
        assert!(matches!(k.market("nope/cet"), Err(ChainbookError::MarketNotFound(_))));
    }

    #[test]
    fn place_order_freezes_custody() {
        let mut k = keeper();
        let order = k.place_order(7, buy(1, 100, 5)).unwrap();
        assert_eq!(order.creation_height, 7);
        assert_eq!(order.frozen_amount, d(500));
        assert_eq!(k.bank().balance(&order.owner, "cet").frozen, d(500));
        assert_eq!(k.order(&order.id).unwrap(), order);
        assert_eq!(k.orders_of_pair("abc/cet").unwrap().len(), 1);
    }

    #[test]
    fn place_order_rejections_touch_nothing() {
        let mut k = keeper();
        k.place_order(1, buy(1, 100, 5)).unwrap();
        let alice = Address::new("alice");
        let before = k.bank().balance(&alice, "cet");

        assert!(matches!(
            k.place_order(1, buy(1, 100, 5)),
            Err(ChainbookError::DuplicateOrder(_))
        ));
        assert!(matches!(
            k.place_order(1, buy(2, 100, 1_000)),
            Err(ChainbookError::InsufficientBalance { .. })
        ));
        let mut other = buy(3, 100, 1);
        other.pair = TradingPair::new("zzz", "cet");
        assert!(matches!(k.place_order(1, other), Err(ChainbookError::MarketNotFound(_))));

        k.policy_mut().forbid("abc", &alice);
        assert!(k.place_order(1, buy(4, 100, 1)).is_err());
        k.policy_mut().allow("abc", &alice);
        k.policy_mut().freeze_token("cet");
        assert!(k.place_order(1, buy(5, 100, 1)).is_err());

        assert_eq!(k.bank().balance(&alice, "cet"), before);
        assert_eq!(k.all_orders().unwrap().len(), 1);
    }

    #[test]
    fn cancel_releases_and_checks_owner() {
        let mut k = keeper();
        let order = k.place_order(1, buy(1, 100, 5)).unwrap();

        assert!(matches!(
            k.cancel_order(2, &Address::new("bob"), &order.id),
            Err(ChainbookError::NotOrderOwner { .. })
        ));

        let event = k.cancel_order(2, &order.owner, &order.id).unwrap();
        assert_eq!(event.reason, CancelReason::Manual);
        assert_eq!(event.released, Coin::new("cet", d(500)));
        assert_eq!(k.bank().balance(&order.owner, "cet").frozen, Decimal::ZERO);
        assert!(matches!(k.order(&order.id), Err(ChainbookError::OrderNotFound(_))));
        assert!(k.cancel_order(3, &order.owner, &order.id).is_err());
    }

    #[test]
    fn refused_release_keeps_order_in_book() {
        let mut k = keeper();
        let mut order = k.place_order(1, buy(1, 100, 5)).unwrap();

        // The book claims more custody than the bank holds.
        order.frozen_amount = d(800);
        OrderIndex::new(&order.pair).update(&mut k.store, &order).unwrap();

        let err = k.cancel_order(2, &order.owner, &order.id).unwrap_err();
        assert!(matches!(err, ChainbookError::Custody { op: "unfreeze", .. }));
        assert_eq!(k.order(&order.id).unwrap(), order);
        assert_eq!(k.orders_of(&order.owner).unwrap(), vec![order.clone()]);
        assert_eq!(k.bank().balance(&order.owner, "cet").frozen, d(500));
    }

    #[test]
    fn owner_queries() {
        let mut k = keeper();
        k.place_order(1, buy(1, 100, 1)).unwrap();
        k.place_order(1, buy(2, 101, 1)).unwrap();
        let alice = Address::new("alice");
        assert_eq!(k.orders_of(&alice).unwrap().len(), 2);
        assert_eq!(k.order_ids_of(&alice).unwrap().len(), 2);
        assert!(k.orders_of(&Address::new("bob")).unwrap().is_empty());
    }

    #[test]
    fn schedule_delist_needs_market() {
        let mut k = keeper();
        assert!(k.schedule_delist("nope/cet", 10).is_err());
        k.schedule_delist("abc/cet", 10).unwrap();
    }
}
