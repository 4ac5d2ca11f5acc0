//! Per-pair order index.
//!
//! Every resting order of a pair is reachable three ways:
//! - **Bid index**: highest price first (price key stored inverted)
//! - **Ask index**: lowest price first
//! - **Age index**: oldest creation height first
//!
//! Within one price (or height) entries are ordered by order id bytes.
//! That order is an artifact of the key layout; execution priority is
//! decided by the matcher, never by iteration order here.
//!
//! All index rows for an order are written or deleted in one
//! [`WriteBatch`], so the three views never disagree.

use chainbook_types::{ChainbookError, Order, OrderId, OrderSide, Result, TradingPair};
use rust_decimal::Decimal;

use crate::global::GlobalOrderLookup;
use crate::keys;
use crate::kv::{KvStore, WriteBatch};

/// Orders on both sides of the book that could trade this block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingCandidates {
    /// Bids priced at or above the best ask, best price first.
    pub bids: Vec<Order>,
    /// Asks priced at or below the best bid, best price first.
    pub asks: Vec<Order>,
}

impl MatchingCandidates {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

/// Index over one trading pair's resting orders.
#[derive(Debug, Clone)]
pub struct OrderIndex {
    pair: TradingPair,
    bid_prefix: Vec<u8>,
    ask_prefix: Vec<u8>,
    age_prefix: Vec<u8>,
}

impl OrderIndex {
    #[must_use]
    pub fn new(pair: &TradingPair) -> Self {
        Self {
            pair: pair.clone(),
            bid_prefix: keys::bid_prefix(pair),
            ask_prefix: keys::ask_prefix(pair),
            age_prefix: keys::age_prefix(pair),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    // =================================================================
    // Mutation
    // =================================================================

    /// Insert a new order into the primary record and all three indices.
    pub fn add(&self, store: &mut KvStore, order: &Order) -> Result<()> {
        self.check_pair(order)?;
        if order.left_quantity <= Decimal::ZERO {
            return Err(ChainbookError::InvalidOrder {
                reason: format!("order {} has no remaining quantity", order.id),
            });
        }
        let order_key = keys::order_key(&order.id);
        if store.contains(&order_key) {
            return Err(ChainbookError::DuplicateOrder(order.id.clone()));
        }

        let mut batch = WriteBatch::new();
        batch.put(order_key, serde_json::to_vec(order)?);
        batch.put(self.side_key(order)?, Vec::new());
        batch.put(keys::age_key(&self.pair, order.creation_height, &order.id), Vec::new());
        store.write(batch);

        tracing::trace!(order_id = %order.id, side = %order.side, price = %order.price, "order indexed");
        Ok(())
    }

    /// Rewrite the stored state of a resting order (after a partial fill).
    ///
    /// Price, side and creation height key the indices and must not change.
    pub fn update(&self, store: &mut KvStore, order: &Order) -> Result<()> {
        self.check_pair(order)?;
        let stored = GlobalOrderLookup::get_by_id(store, &order.id)?;
        if stored.side != order.side
            || stored.price != order.price
            || stored.creation_height != order.creation_height
        {
            return Err(ChainbookError::Internal(format!(
                "update would move order {} in the index",
                order.id
            )));
        }
        if order.left_quantity <= Decimal::ZERO {
            return Err(ChainbookError::Internal(format!(
                "filled order {} must be removed, not updated",
                order.id
            )));
        }

        let mut batch = WriteBatch::new();
        batch.put(keys::order_key(&order.id), serde_json::to_vec(order)?);
        store.write(batch);
        Ok(())
    }

    /// Delete an order and its index rows. Returns the stored order.
    pub fn remove(&self, store: &mut KvStore, id: &OrderId) -> Result<Order> {
        let stored = GlobalOrderLookup::get_by_id(store, id)?;
        self.check_pair(&stored)?;

        let mut batch = WriteBatch::new();
        batch.delete(keys::order_key(id));
        batch.delete(self.side_key(&stored)?);
        batch.delete(keys::age_key(&self.pair, stored.creation_height, id));
        store.write(batch);

        tracing::trace!(order_id = %id, "order unindexed");
        Ok(stored)
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Highest bid price, if any.
    pub fn best_bid(&self, store: &KvStore) -> Result<Option<Decimal>> {
        match store.prefix(&self.bid_prefix).next() {
            Some((key, _)) => Ok(Some(keys::split_bid_key(self.bid_prefix.len(), key)?.0)),
            None => Ok(None),
        }
    }

    /// Lowest ask price, if any.
    pub fn best_ask(&self, store: &KvStore) -> Result<Option<Decimal>> {
        match store.prefix(&self.ask_prefix).next() {
            Some((key, _)) => Ok(Some(keys::split_ask_key(self.ask_prefix.len(), key)?.0)),
            None => Ok(None),
        }
    }

    /// Orders that could trade at some price this block.
    ///
    /// Empty unless the book is crossed (best ask <= best bid). Otherwise
    /// every ask priced at or below the best bid and every bid priced at or
    /// above the best ask.
    pub fn matching_candidates(&self, store: &KvStore) -> Result<MatchingCandidates> {
        let (Some(best_bid), Some(best_ask)) = (self.best_bid(store)?, self.best_ask(store)?) else {
            return Ok(MatchingCandidates::default());
        };
        if best_ask > best_bid {
            return Ok(MatchingCandidates::default());
        }

        let mut bids = Vec::new();
        for (key, _) in store.prefix(&self.bid_prefix) {
            let (price, id) = keys::split_bid_key(self.bid_prefix.len(), key)?;
            if price < best_ask {
                break;
            }
            bids.push(self.load_indexed(store, &id)?);
        }

        let mut asks = Vec::new();
        for (key, _) in store.prefix(&self.ask_prefix) {
            let (price, id) = keys::split_ask_key(self.ask_prefix.len(), key)?;
            if price > best_bid {
                break;
            }
            asks.push(self.load_indexed(store, &id)?);
        }

        Ok(MatchingCandidates { bids, asks })
    }

    /// Orders created strictly before `height`, newest first.
    pub fn older_than(&self, store: &KvStore, height: u64) -> Result<Vec<Order>> {
        let upper = keys::age_height_prefix(&self.pair, height);
        store
            .range(&self.age_prefix, &upper)
            .rev()
            .map(|(key, _)| {
                let (_, id) = keys::split_age_key(self.age_prefix.len(), key)?;
                self.load_indexed(store, &id)
            })
            .collect()
    }

    /// Orders created at exactly `height`.
    pub fn at_height(&self, store: &KvStore, height: u64) -> Result<Vec<Order>> {
        let prefix = keys::age_height_prefix(&self.pair, height);
        store
            .prefix(&prefix)
            .map(|(key, _)| {
                let (_, id) = keys::split_age_key(self.age_prefix.len(), key)?;
                self.load_indexed(store, &id)
            })
            .collect()
    }

    /// Every resting order of the pair, oldest first.
    pub fn all_orders(&self, store: &KvStore) -> Result<Vec<Order>> {
        store
            .prefix(&self.age_prefix)
            .map(|(key, _)| {
                let (_, id) = keys::split_age_key(self.age_prefix.len(), key)?;
                self.load_indexed(store, &id)
            })
            .collect()
    }

    /// Resting orders on one side, best price first.
    pub fn side_orders(&self, store: &KvStore, side: OrderSide) -> Result<Vec<Order>> {
        match side {
            OrderSide::Buy => store
                .prefix(&self.bid_prefix)
                .map(|(key, _)| {
                    let (_, id) = keys::split_bid_key(self.bid_prefix.len(), key)?;
                    self.load_indexed(store, &id)
                })
                .collect(),
            OrderSide::Sell => store
                .prefix(&self.ask_prefix)
                .map(|(key, _)| {
                    let (_, id) = keys::split_ask_key(self.ask_prefix.len(), key)?;
                    self.load_indexed(store, &id)
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn order_count(&self, store: &KvStore) -> usize {
        store.prefix(&self.age_prefix).count()
    }

    // =================================================================
    // Internals
    // =================================================================

    fn side_key(&self, order: &Order) -> Result<Vec<u8>> {
        match order.side {
            OrderSide::Buy => keys::bid_key(&self.pair, &order.price, &order.id),
            OrderSide::Sell => keys::ask_key(&self.pair, &order.price, &order.id),
        }
    }

    fn check_pair(&self, order: &Order) -> Result<()> {
        if order.pair == self.pair {
            Ok(())
        } else {
            Err(ChainbookError::InvalidOrder {
                reason: format!("order {} belongs to {}, not {}", order.id, order.pair, self.pair),
            })
        }
    }

    /// Load an order an index row points to. A dangling row is corruption.
    fn load_indexed(&self, store: &KvStore, id: &OrderId) -> Result<Order> {
        match GlobalOrderLookup::get_by_id(store, id) {
            Err(ChainbookError::OrderNotFound(_)) => Err(ChainbookError::CorruptEntry {
                reason: format!("index row for {} on {} has no order", id, self.pair),
            }),
            other => other,
        }
    }
}
