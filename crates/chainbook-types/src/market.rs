//! Trading pair records and custody amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TradingPair;

/// One registered trading pair.
///
/// `last_executed_price` is the reference price for the next block's
/// matching pass; zero means the pair has never traded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub pair: TradingPair,
    /// Maximum decimal places a limit price on this pair may carry.
    pub price_precision: u32,
    pub last_executed_price: Decimal,
}

impl MarketInfo {
    #[must_use]
    pub fn new(pair: TradingPair, price_precision: u32, initial_price: Decimal) -> Self {
        Self {
            pair,
            price_precision,
            last_executed_price: initial_price,
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        self.pair.symbol()
    }
}

/// An amount of one denomination, as moved by the bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Decimal,
}

impl Coin {
    #[must_use]
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A single balance entry for an `(owner, denom)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    /// Available for new orders / transfers.
    pub available: Decimal,
    /// Reserved by resting orders.
    pub frozen: Decimal,
}

impl BalanceEntry {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
        }
    }

    /// Total balance (available + frozen).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.frozen
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.frozen.is_zero()
    }
}

impl Default for BalanceEntry {
    fn default() -> Self {
        Self::new()
    }
}
