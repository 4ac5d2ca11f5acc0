//! Pair-independent order lookups.
//!
//! The primary order record is keyed by order id alone. Ids embed the owner
//! followed by the `-` separator, so the orders of one address form a
//! contiguous key range.

use chainbook_types::{Address, ChainbookError, Order, OrderId, Result};

use crate::keys;
use crate::kv::KvStore;

/// Lookups across every trading pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalOrderLookup;

impl GlobalOrderLookup {
    /// The order with this id, or [`ChainbookError::OrderNotFound`].
    pub fn get_by_id(store: &KvStore, id: &OrderId) -> Result<Order> {
        let bytes = store
            .get(&keys::order_key(id))
            .ok_or_else(|| ChainbookError::OrderNotFound(id.clone()))?;
        decode_order(bytes)
    }

    /// The order with this id, if present.
    pub fn find(store: &KvStore, id: &OrderId) -> Result<Option<Order>> {
        store.get(&keys::order_key(id)).map(decode_order).transpose()
    }

    /// Every resting order in the store, ordered by id bytes.
    pub fn all_orders(store: &KvStore) -> Result<Vec<Order>> {
        store
            .prefix(&[keys::ORDER_PREFIX])
            .map(|(_, value)| decode_order(value))
            .collect()
    }

    /// Ids of the resting orders placed by `owner`.
    pub fn order_ids_for_owner(store: &KvStore, owner: &Address) -> Result<Vec<OrderId>> {
        store
            .prefix(&keys::owner_prefix(owner))
            .map(|(key, _)| keys::order_id_from_tail(key, 1))
            .collect()
    }

    /// Resting orders placed by `owner`.
    pub fn orders_for_owner(store: &KvStore, owner: &Address) -> Result<Vec<Order>> {
        store
            .prefix(&keys::owner_prefix(owner))
            .map(|(_, value)| decode_order(value))
            .collect()
    }
}

fn decode_order(bytes: &[u8]) -> Result<Order> {
    serde_json::from_slice(bytes).map_err(|e| ChainbookError::CorruptEntry {
        reason: format!("order record: {e}"),
    })
}
