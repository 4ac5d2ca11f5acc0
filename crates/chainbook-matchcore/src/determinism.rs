//! Determinism utilities: execution priority and the per-block event root.
//!
//! Every node finalizing the same block must execute fills in the same
//! order and emit the same events. Priority among orders at the same price
//! and height is decided by a hash of the order id and the block's data
//! hash, so it cannot be predicted before the block exists yet is identical
//! everywhere once it does.

use std::cmp::Reverse;

use chainbook_types::{BlockEvent, CancelEvent, FillEvent, Order, OrderSide};
use sha2::{Digest, Sha256};

/// `SHA-256(order_id bytes || data_hash)`.
///
/// The input layout is part of consensus: raw id string bytes followed by
/// the raw block data hash, no separator or length prefix.
#[must_use]
pub fn tie_break_hash(order_id: &str, data_hash: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update(data_hash);
    hasher.finalize().into()
}

/// Sort one side of the book into execution priority.
///
/// Better price first (higher for bids, lower for asks), then lower
/// creation height, then ascending [`tie_break_hash`].
pub fn sort_by_priority(orders: &mut [Order], data_hash: &[u8]) {
    orders.sort_by_cached_key(|o| {
        let hash = tie_break_hash(o.id.as_str(), data_hash);
        let price = match o.side {
            OrderSide::Buy => Reverse(o.price),
            // Lowest ask first.
            OrderSide::Sell => Reverse(-o.price),
        };
        (price, o.creation_height, hash)
    });
}

/// Hash over every event of a block, in emission order.
#[must_use]
pub fn compute_event_root(events: &[BlockEvent]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"chainbook:event_root:v1:");
    hasher.update((events.len() as u64).to_le_bytes());

    for event in events {
        match event {
            BlockEvent::Fill(fill) => hash_fill(&mut hasher, fill),
            BlockEvent::Cancel(cancel) => hash_cancel(&mut hasher, cancel),
        }
    }

    hasher.finalize().into()
}

/// Recompute the root and compare.
#[must_use]
pub fn verify_event_root(events: &[BlockEvent], expected_root: &[u8; 32]) -> bool {
    compute_event_root(events) == *expected_root
}

fn hash_fill(hasher: &mut Sha256, fill: &FillEvent) {
    hasher.update([0u8]);
    hasher.update(fill.id.0.as_bytes());
    hasher.update(fill.height.to_le_bytes());
    hash_str(hasher, &fill.pair.symbol());
    hash_str(hasher, fill.bid_order_id.as_str());
    hash_str(hasher, fill.buyer.as_str());
    hash_str(hasher, fill.ask_order_id.as_str());
    hash_str(hasher, fill.seller.as_str());
    hash_str(hasher, &fill.price.normalize().to_string());
    hash_str(hasher, &fill.quantity.normalize().to_string());
    hash_str(hasher, &fill.money_amount.normalize().to_string());
}

fn hash_cancel(hasher: &mut Sha256, cancel: &CancelEvent) {
    hasher.update([1u8]);
    hasher.update(cancel.height.to_le_bytes());
    hash_str(hasher, cancel.order_id.as_str());
    hash_str(hasher, cancel.owner.as_str());
    hash_str(hasher, &cancel.pair.symbol());
    hasher.update([cancel.reason.code()]);
    hash_str(hasher, &cancel.left_quantity.normalize().to_string());
    hash_str(hasher, &cancel.released.denom);
    hash_str(hasher, &cancel.released.amount.normalize().to_string());
    hash_str(hasher, &cancel.deal_quantity.normalize().to_string());
    hash_str(hasher, &cancel.deal_amount.normalize().to_string());
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
