//! Events produced at block end.
//!
//! A [`FillEvent`] records one execution between a bid and an ask at the
//! pair's clearing price. A [`CancelEvent`] records an order leaving the book
//! together with the custody released back to its owner. Both are collected
//! into the [`BlockReport`] returned by the block-end entry point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Coin, FillId, OrderId, TradingPair};

/// One execution between a bid and an ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Deterministic id from height, pair and fill sequence.
    pub id: FillId,
    pub height: u64,
    pub pair: TradingPair,
    pub bid_order_id: OrderId,
    pub buyer: Address,
    pub ask_order_id: OrderId,
    pub seller: Address,
    /// Uniform clearing price of the pass.
    pub price: Decimal,
    /// Stock moved from seller to buyer.
    pub quantity: Decimal,
    /// Money moved from buyer to seller (`price * quantity`).
    pub money_amount: Decimal,
}

impl FillEvent {
    /// Coin the seller delivers.
    #[must_use]
    pub fn stock_coin(&self) -> Coin {
        Coin::new(self.pair.stock.clone(), self.quantity)
    }

    /// Coin the buyer pays.
    #[must_use]
    pub fn money_coin(&self) -> Coin {
        Coin::new(self.pair.money.clone(), self.money_amount)
    }
}

impl std::fmt::Display for FillEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fill[{}] {} {} @ {} = {} ({} <- {})",
            self.id,
            self.pair,
            self.quantity,
            self.price,
            self.money_amount,
            self.bid_order_id,
            self.ask_order_id,
        )
    }
}

/// Why an order left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// Fully filled; any unused custody (bid price improvement) is released.
    Filled,
    /// IOC order whose block ended.
    IocUnfilled,
    /// Frozen custody no longer covered the remaining quantity.
    InsufficientFunds,
    /// GTE order outlived the lifetime parameter.
    Expired,
    /// The pair was delisted.
    Delisted,
    /// The owner cancelled it.
    Manual,
}

impl CancelReason {
    /// Stable numeric code, used when hashing events.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Filled => 0,
            Self::IocUnfilled => 1,
            Self::InsufficientFunds => 2,
            Self::Expired => 3,
            Self::Delisted => 4,
            Self::Manual => 5,
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filled => write!(f, "FILLED"),
            Self::IocUnfilled => write!(f, "IOC_UNFILLED"),
            Self::InsufficientFunds => write!(f, "INSUFFICIENT_FUNDS"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Delisted => write!(f, "DELISTED"),
            Self::Manual => write!(f, "MANUAL"),
        }
    }
}

/// An order removed from the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelEvent {
    pub height: u64,
    pub order_id: OrderId,
    pub owner: Address,
    pub pair: TradingPair,
    pub reason: CancelReason,
    pub left_quantity: Decimal,
    /// Custody returned to the owner's available balance.
    pub released: Coin,
    pub deal_quantity: Decimal,
    pub deal_amount: Decimal,
}

/// Anything observable that happened at block end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEvent {
    Fill(FillEvent),
    Cancel(CancelEvent),
}

/// A pair whose processing failed with a non-fatal error this block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    pub pair: TradingPair,
    pub reason: String,
}

/// Clearing price produced for a pair this block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingRecord {
    pub pair: TradingPair,
    pub price: Decimal,
}

/// Everything a block-end pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReport {
    pub height: u64,
    /// `true` when this was the daily expiry block (matching skipped).
    pub expiry_sweep: bool,
    pub events: Vec<BlockEvent>,
    /// SHA-256 over all events in order, for cross-node comparison.
    pub event_root: [u8; 32],
    pub clearing_prices: Vec<ClearingRecord>,
    pub failures: Vec<PairFailure>,
}

impl BlockReport {
    /// Iterate over the fills of this block.
    pub fn fills(&self) -> impl Iterator<Item = &FillEvent> {
        self.events.iter().filter_map(|e| match e {
            BlockEvent::Fill(fill) => Some(fill),
            BlockEvent::Cancel(_) => None,
        })
    }

    /// Iterate over the removals of this block.
    pub fn cancels(&self) -> impl Iterator<Item = &CancelEvent> {
        self.events.iter().filter_map(|e| match e {
            BlockEvent::Cancel(cancel) => Some(cancel),
            BlockEvent::Fill(_) => None,
        })
    }

    /// Clearing price of `pair` this block, if it traded.
    #[must_use]
    pub fn clearing_price(&self, pair: &TradingPair) -> Option<Decimal> {
        self.clearing_prices
            .iter()
            .find(|r| &r.pair == pair)
            .map(|r| r.price)
    }
}
