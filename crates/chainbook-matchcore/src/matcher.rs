//! Pure deterministic call-auction matcher.
//!
//! Takes the candidate orders of one pair and produces the fills of one
//! matching pass plus the resulting order state. No store access, no
//! custody calls: the caller persists orders and settles fills.
//!
//! ```text
//! match_orders(MatchInput, bids, asks) -> MatchOutcome
//! ```
//!
//! ## Funding
//!
//! An order whose frozen custody no longer covers its remaining quantity at
//! the tentative clearing price is taken out of the auction and the price is
//! computed again without it, until no further order drops out. Dropped
//! orders stay out for the rest of the pass and are reported as terminal
//! with [`CancelReason::InsufficientFunds`]. Fills only happen at the final
//! price, so no unfunded volume ever shapes it.
//!
//! Self-trades are not prevented: an owner's bid may fill against the same
//! owner's ask.

use chainbook_types::{
    CancelReason, ChainbookError, FillEvent, FillId, Order, Result, TradingPair,
};
use rust_decimal::Decimal;

use crate::clearing::{ClearingResult, PriceBand, compute_clearing_price};
use crate::determinism::sort_by_priority;

/// Block context of one matching pass.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub pair: &'a TradingPair,
    pub height: u64,
    /// Opaque block hash used for the priority tie-break.
    pub data_hash: &'a [u8],
    pub band: PriceBand,
    /// Sequence number of the first fill of this pass within the block.
    pub fill_seq_start: u64,
}

/// Everything one pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub clearing: Option<ClearingResult>,
    pub fills: Vec<FillEvent>,
    /// Partially filled orders that stay in the book.
    pub updated: Vec<Order>,
    /// Orders that leave the book, with why.
    pub terminal: Vec<(Order, CancelReason)>,
}

impl MatchOutcome {
    #[must_use]
    pub fn clearing_price(&self) -> Option<Decimal> {
        self.clearing.as_ref().map(|c| c.clearing_price)
    }

    /// Orders skipped for lack of frozen funds.
    #[must_use]
    pub fn insufficient_funds_count(&self) -> usize {
        self.terminal
            .iter()
            .filter(|(_, reason)| *reason == CancelReason::InsufficientFunds)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty() && self.updated.is_empty() && self.terminal.is_empty()
    }
}

/// Run one matching pass over the candidates of a pair.
pub fn match_orders(input: &MatchInput<'_>, mut bids: Vec<Order>, mut asks: Vec<Order>) -> Result<MatchOutcome> {
    sort_by_priority(&mut bids, input.data_hash);
    sort_by_priority(&mut asks, input.data_hash);

    let mut unfunded = Vec::new();
    let clearing = loop {
        let Some(clearing) = compute_clearing_price(&bids, &asks, &input.band)? else {
            break None;
        };
        let dropped = unfunded.len();
        drain_unfunded(&mut bids, clearing.clearing_price, &mut unfunded);
        drain_unfunded(&mut asks, clearing.clearing_price, &mut unfunded);
        if unfunded.len() == dropped {
            break Some(clearing);
        }
    };

    let mut outcome = MatchOutcome {
        terminal: unfunded
            .into_iter()
            .map(|order| (order, CancelReason::InsufficientFunds))
            .collect(),
        ..MatchOutcome::default()
    };
    let Some(clearing) = clearing else {
        return Ok(outcome);
    };
    let price = clearing.clearing_price;

    let mut bid_traded = vec![false; bids.len()];
    let mut ask_traded = vec![false; asks.len()];
    let mut fill_seq = input.fill_seq_start;
    let mut bi = 0;
    let mut ai = 0;

    while let (Some(bid), Some(ask)) = (bids.get_mut(bi), asks.get_mut(ai)) {
        if !bid.crosses(price) || !ask.crosses(price) {
            break;
        }

        let quantity = bid.left_quantity.min(ask.left_quantity);
        let money_amount = checked(quantity.checked_mul(price), "fill amount")?;

        bid.left_quantity -= quantity;
        bid.frozen_amount -= money_amount;
        bid.deal_quantity = checked(bid.deal_quantity.checked_add(quantity), "deal quantity")?;
        bid.deal_amount = checked(bid.deal_amount.checked_add(money_amount), "deal amount")?;

        ask.left_quantity -= quantity;
        ask.frozen_amount -= quantity;
        ask.deal_quantity = checked(ask.deal_quantity.checked_add(quantity), "deal quantity")?;
        ask.deal_amount = checked(ask.deal_amount.checked_add(money_amount), "deal amount")?;

        let fill = FillEvent {
            id: FillId::deterministic(input.height, input.pair, fill_seq),
            height: input.height,
            pair: input.pair.clone(),
            bid_order_id: bid.id.clone(),
            buyer: bid.owner.clone(),
            ask_order_id: ask.id.clone(),
            seller: ask.owner.clone(),
            price,
            quantity,
            money_amount,
        };
        tracing::debug!(
            fill_id = %fill.id,
            bid = %fill.bid_order_id,
            ask = %fill.ask_order_id,
            quantity = %quantity,
            price = %price,
            "fill"
        );
        outcome.fills.push(fill);
        fill_seq += 1;

        bid_traded[bi] = true;
        ask_traded[ai] = true;
        if bid.is_filled() {
            bi += 1;
        }
        if ask.is_filled() {
            ai += 1;
        }
    }

    outcome.clearing = Some(clearing);
    for (order, traded) in bids.into_iter().zip(bid_traded).chain(asks.into_iter().zip(ask_traded)) {
        classify(&mut outcome, order, traded);
    }
    Ok(outcome)
}

/// Move crossing orders that can no longer pay for their remainder at
/// `price` out of `orders`, keeping priority order for the rest.
fn drain_unfunded(orders: &mut Vec<Order>, price: Decimal, unfunded: &mut Vec<Order>) {
    let (funded, short): (Vec<Order>, Vec<Order>) = std::mem::take(orders)
        .into_iter()
        .partition(|order| !order.crosses(price) || order.has_sufficient_frozen_at(price));
    for order in &short {
        tracing::warn!(
            order_id = %order.id,
            left = %order.left_quantity,
            frozen = %order.frozen_amount,
            price = %price,
            "insufficient frozen funds, dropping order from auction"
        );
    }
    *orders = funded;
    unfunded.extend(short);
}

fn classify(outcome: &mut MatchOutcome, order: Order, traded: bool) {
    if order.is_filled() {
        outcome.terminal.push((order, CancelReason::Filled));
    } else if order.is_ioc() {
        outcome.terminal.push((order, CancelReason::IocUnfilled));
    } else if traded {
        outcome.updated.push(order);
    }
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| ChainbookError::ArithmeticOverflow {
        reason: what.to_owned(),
    })
}
