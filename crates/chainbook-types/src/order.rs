//! Order types for the chainbook matching core.
//!
//! An [`Order`] enters the book only after its custody freeze succeeded.
//! Identity fields never change; `left_quantity`, `frozen_amount` and the
//! accumulated deal figures are mutated only by the matcher during
//! block-end settlement.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, OrderId, TradingPair};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    /// Bid: pays money, receives stock.
    Buy,
    /// Ask: pays stock, receives money.
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How long an order may rest on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till expiry (or cancel): rests across blocks.
    Gte,
    /// Immediate or cancel: never outlives the block it was created in.
    Ioc,
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gte => write!(f, "GTE"),
            Self::Ioc => write!(f, "IOC"),
        }
    }
}

/// A resting or partially filled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: Address,
    pub pair: TradingPair,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub left_quantity: Decimal,
    /// Custody still reserved for this order (money for bids, stock for asks).
    pub frozen_amount: Decimal,
    pub time_in_force: TimeInForce,
    pub creation_height: u64,
    pub deal_quantity: Decimal,
    /// Money exchanged so far (paid by bids, received by asks).
    pub deal_amount: Decimal,
}

impl Order {
    /// Denomination reserved by this order.
    #[must_use]
    pub fn frozen_denom(&self) -> &str {
        match self.side {
            OrderSide::Buy => &self.pair.money,
            OrderSide::Sell => &self.pair.stock,
        }
    }

    /// Custody needed to fill the remaining quantity at `price`.
    ///
    /// Returns `None` if the multiplication overflows.
    #[must_use]
    pub fn required_frozen_at(&self, price: Decimal) -> Option<Decimal> {
        match self.side {
            OrderSide::Buy => self.left_quantity.checked_mul(price),
            OrderSide::Sell => Some(self.left_quantity),
        }
    }

    /// Whether the reserved custody still covers the remaining quantity at `price`.
    #[must_use]
    pub fn has_sufficient_frozen_at(&self, price: Decimal) -> bool {
        self.required_frozen_at(price)
            .is_some_and(|needed| self.frozen_amount >= needed)
    }

    /// Whether this order would trade at `price`.
    #[must_use]
    pub fn crosses(&self, price: Decimal) -> bool {
        match self.side {
            OrderSide::Buy => self.price >= price,
            OrderSide::Sell => self.price <= price,
        }
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.left_quantity.is_zero()
    }

    #[must_use]
    pub fn filled_qty(&self) -> Decimal {
        self.quantity - self.left_quantity
    }

    #[must_use]
    pub fn is_ioc(&self) -> bool {
        self.time_in_force == TimeInForce::Ioc
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// A fully funded GTE limit order on `abc/cet`, created at height 1.
    pub fn dummy_limit(owner: &str, sequence: u64, side: OrderSide, price: Decimal, qty: Decimal) -> Self {
        let owner = Address::new(owner);
        let frozen = match side {
            OrderSide::Buy => price * qty,
            OrderSide::Sell => qty,
        };
        Self {
            id: OrderId::new(&owner, sequence, 0),
            owner,
            pair: TradingPair::new("abc", "cet"),
            side,
            price,
            quantity: qty,
            left_quantity: qty,
            frozen_amount: frozen,
            time_in_force: TimeInForce::Gte,
            creation_height: 1,
            deal_quantity: Decimal::ZERO,
            deal_amount: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn at_height(mut self, height: u64) -> Self {
        self.creation_height = height;
        self
    }

    #[must_use]
    pub fn ioc(mut self) -> Self {
        self.time_in_force = TimeInForce::Ioc;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_denom_by_side() {
        let bid = Order::dummy_limit("alice", 1, OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let ask = Order::dummy_limit("bob", 1, OrderSide::Sell, Decimal::new(100, 0), Decimal::ONE);
        assert_eq!(bid.frozen_denom(), "cet");
        assert_eq!(ask.frozen_denom(), "abc");
    }

    #[test]
    fn sufficiency_check() {
        let mut bid =
            Order::dummy_limit("alice", 1, OrderSide::Buy, Decimal::new(100, 0), Decimal::new(10, 0));
        assert!(bid.has_sufficient_frozen_at(Decimal::new(100, 0)));
        bid.frozen_amount = Decimal::new(500, 0);
        assert!(bid.has_sufficient_frozen_at(Decimal::new(50, 0)));
        assert!(!bid.has_sufficient_frozen_at(Decimal::new(51, 0)));

        let mut ask =
            Order::dummy_limit("bob", 1, OrderSide::Sell, Decimal::new(100, 0), Decimal::new(10, 0));
        ask.frozen_amount = Decimal::new(9, 0);
        assert!(!ask.has_sufficient_frozen_at(Decimal::new(1, 0)));
    }

    #[test]
    fn crossing() {
        let bid = Order::dummy_limit("alice", 1, OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        assert!(bid.crosses(Decimal::new(99, 0)));
        assert!(bid.crosses(Decimal::new(100, 0)));
        assert!(!bid.crosses(Decimal::new(101, 0)));

        let ask = Order::dummy_limit("bob", 1, OrderSide::Sell, Decimal::new(100, 0), Decimal::ONE);
        assert!(ask.crosses(Decimal::new(101, 0)));
        assert!(!ask.crosses(Decimal::new(99, 0)));
    }

    #[test]
    fn order_side_display() {
        assert_eq!(format!("{}", OrderSide::Buy), "BUY");
        assert_eq!(format!("{}", OrderSide::Sell), "SELL");
        assert_eq!(format!("{}", TimeInForce::Ioc), "IOC");
    }

    #[test]
    fn fill_tracking() {
        let mut order =
            Order::dummy_limit("alice", 1, OrderSide::Buy, Decimal::new(100, 0), Decimal::new(10, 0));
        assert!(!order.is_filled());
        order.left_quantity = Decimal::ZERO;
        assert!(order.is_filled());
        assert_eq!(order.filled_qty(), Decimal::new(10, 0));
    }

    #[test]
    fn serde_roundtrip() {
        let order = Order::dummy_limit("alice", 7, OrderSide::Sell, Decimal::new(12345, 2), Decimal::new(3, 0))
            .ioc()
            .at_height(42);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
