//! Aggregated demand and supply at one candidate price.

use std::collections::BTreeMap;

use chainbook_types::{ChainbookError, Order, OrderSide, Result};
use rust_decimal::Decimal;

/// One distinct candidate price with its accumulated volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    pub price: Decimal,
    /// Bid quantity priced at or above `price`.
    pub bid_accum: Decimal,
    /// Ask quantity priced at or below `price`.
    pub ask_accum: Decimal,
}

impl PricePoint {
    /// Volume that can change hands at this price.
    #[must_use]
    pub fn executable_amount(&self) -> Decimal {
        self.bid_accum.min(self.ask_accum)
    }

    /// Positive means net buying pressure.
    #[must_use]
    pub fn imbalance(&self) -> Decimal {
        self.bid_accum - self.ask_accum
    }
}

/// Build one point per distinct price, sorted by descending price.
///
/// Bid volume accumulates top-down, ask volume bottom-up.
pub fn build_price_points(bids: &[Order], asks: &[Order]) -> Result<Vec<PricePoint>> {
    // price -> (bid qty at price, ask qty at price)
    let mut levels: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();
    for order in bids.iter().chain(asks) {
        let entry = levels.entry(order.price).or_insert((Decimal::ZERO, Decimal::ZERO));
        let slot = match order.side {
            OrderSide::Buy => &mut entry.0,
            OrderSide::Sell => &mut entry.1,
        };
        *slot = add(*slot, order.left_quantity)?;
    }

    let mut points: Vec<PricePoint> = levels
        .keys()
        .rev()
        .map(|&price| PricePoint {
            price,
            bid_accum: Decimal::ZERO,
            ask_accum: Decimal::ZERO,
        })
        .collect();

    let mut bid_running = Decimal::ZERO;
    for (point, (bid_qty, _)) in points.iter_mut().zip(levels.values().rev()) {
        bid_running = add(bid_running, *bid_qty)?;
        point.bid_accum = bid_running;
    }

    let mut ask_running = Decimal::ZERO;
    for (point, (_, ask_qty)) in points.iter_mut().rev().zip(levels.values()) {
        ask_running = add(ask_running, *ask_qty)?;
        point.ask_accum = ask_running;
    }

    Ok(points)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| ChainbookError::ArithmeticOverflow {
        reason: format!("volume {a} + {b}"),
    })
}
