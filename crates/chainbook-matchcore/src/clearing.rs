//! Clearing price computation for the per-block call auction.
//!
//! Every candidate price is scored by the volume that could trade there.
//! The clearing price maximizes executable volume, then minimizes the
//! leftover imbalance, and settles remaining ties by market pressure
//! relative to a reference price band.
//!
//! The computation is a pure function of its inputs: same orders and same
//! band give the same price on every node.

use chainbook_types::{ChainbookError, Order, Result};
use rust_decimal::Decimal;

use crate::price_point::{PricePoint, build_price_points};

/// Reference price and the band allowed around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    /// Usually the pair's last executed price. Zero means never traded.
    pub reference: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl PriceBand {
    /// Band of `reference * (1 ± ratio)`. `ratio` is a fraction (0.25 for 25%).
    pub fn around(reference: Decimal, ratio: Decimal) -> Result<Self> {
        let overflow = || ChainbookError::ArithmeticOverflow {
            reason: format!("price band around {reference} with ratio {ratio}"),
        };
        let high = reference
            .checked_mul(Decimal::ONE + ratio)
            .ok_or_else(overflow)?;
        let low = reference
            .checked_mul(Decimal::ONE - ratio)
            .ok_or_else(overflow)?;
        Ok(Self { reference, high, low })
    }

    #[must_use]
    pub fn has_reference(&self) -> bool {
        !self.reference.is_zero()
    }
}

/// Result of clearing price computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingResult {
    /// The uniform price every fill of the pass executes at.
    pub clearing_price: Decimal,
    /// Volume that trades at the clearing price.
    pub executable_amount: Decimal,
    /// How the price was picked.
    pub rule: ClearingRule,
}

/// Which step of the selection produced the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearingRule {
    MaxVolume,
    MinImbalance,
    /// No reference price: middle of the tied prices.
    Midpoint,
    /// Buying pressure: band top clamped into the tied range.
    BuyPressure,
    /// Selling pressure: band bottom clamped into the tied range.
    SellPressure,
    /// Tied prices on both sides of zero imbalance: reference, clamped.
    Reference,
}

/// Compute the clearing price for a candidate set.
///
/// Algorithm:
/// 1. One [`PricePoint`] per distinct price, descending
/// 2. Keep the points with maximum executable amount
/// 3. Among those, keep the points with minimum `|imbalance|`
/// 4. Break any remaining tie by market pressure against `band`
///
/// Returns `None` when nothing can trade.
pub fn compute_clearing_price(
    bids: &[Order],
    asks: &[Order],
    band: &PriceBand,
) -> Result<Option<ClearingResult>> {
    let points = build_price_points(bids, asks)?;

    let Some(max_exec) = points.iter().map(PricePoint::executable_amount).max() else {
        return Ok(None);
    };
    if max_exec <= Decimal::ZERO {
        return Ok(None);
    }

    let by_volume: Vec<&PricePoint> = points
        .iter()
        .filter(|p| p.executable_amount() == max_exec)
        .collect();
    if let [only] = by_volume.as_slice() {
        return Ok(Some(result(only.price, max_exec, ClearingRule::MaxVolume)));
    }

    let min_imbalance = by_volume
        .iter()
        .map(|p| p.imbalance().abs())
        .min()
        .unwrap_or(Decimal::ZERO);
    let tied: Vec<&PricePoint> = by_volume
        .into_iter()
        .filter(|p| p.imbalance().abs() == min_imbalance)
        .collect();
    if let [only] = tied.as_slice() {
        return Ok(Some(result(only.price, max_exec, ClearingRule::MinImbalance)));
    }

    let (price, rule) = resolve_by_pressure(&tied, band);
    Ok(Some(result(price, max_exec, rule)))
}

fn result(clearing_price: Decimal, executable_amount: Decimal, rule: ClearingRule) -> ClearingResult {
    ClearingResult {
        clearing_price,
        executable_amount,
        rule,
    }
}

/// Pick among points tied on volume and imbalance. `tied` is in descending
/// price order and holds at least two points.
fn resolve_by_pressure(tied: &[&PricePoint], band: &PriceBand) -> (Decimal, ClearingRule) {
    let highest = tied.first().map_or(Decimal::ZERO, |p| p.price);
    let lowest = tied.last().map_or(Decimal::ZERO, |p| p.price);

    if !band.has_reference() {
        let middle = tied.get(tied.len() / 2).map_or(lowest, |p| p.price);
        return (middle, ClearingRule::Midpoint);
    }

    if tied.iter().all(|p| p.imbalance() >= Decimal::ZERO) {
        // Buying pressure: the band top, held inside the tied range.
        return (band.high.clamp(lowest, highest), ClearingRule::BuyPressure);
    }

    if tied.iter().all(|p| p.imbalance() <= Decimal::ZERO) {
        // Selling pressure: the band bottom, held inside the tied range.
        return (band.low.clamp(lowest, highest), ClearingRule::SellPressure);
    }

    (band.reference.clamp(lowest, highest), ClearingRule::Reference)
}
