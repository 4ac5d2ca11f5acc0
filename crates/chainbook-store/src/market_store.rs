//! Market records, the delisting schedule and the last processed day.

use chainbook_types::{ChainbookError, MarketInfo, Result};

use crate::keys;
use crate::kv::{KvStore, WriteBatch};

/// Typed access to market-level records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketStore;

impl MarketStore {
    // =================================================================
    // Markets
    // =================================================================

    pub fn get(store: &KvStore, symbol: &str) -> Result<Option<MarketInfo>> {
        store
            .get(&keys::market_key(symbol))
            .map(|bytes| decode(bytes, "market"))
            .transpose()
    }

    /// Like [`MarketStore::get`] but a missing market is an error.
    pub fn require(store: &KvStore, symbol: &str) -> Result<MarketInfo> {
        Self::get(store, symbol)?.ok_or_else(|| ChainbookError::MarketNotFound(symbol.to_owned()))
    }

    pub fn set(store: &mut KvStore, info: &MarketInfo) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(keys::market_key(&info.symbol()), serde_json::to_vec(info)?);
        store.write(batch);
        Ok(())
    }

    pub fn remove(store: &mut KvStore, symbol: &str) {
        let mut batch = WriteBatch::new();
        batch.delete(keys::market_key(symbol));
        store.write(batch);
    }

    /// All markets, ordered by symbol bytes.
    pub fn all(store: &KvStore) -> Result<Vec<MarketInfo>> {
        store
            .prefix(&[keys::MARKET_PREFIX])
            .map(|(_, value)| decode(value, "market"))
            .collect()
    }

    // =================================================================
    // Delisting schedule
    // =================================================================

    pub fn schedule_delist(store: &mut KvStore, symbol: &str, height: u64) {
        let mut batch = WriteBatch::new();
        batch.put(keys::delist_key(height, symbol), Vec::new());
        store.write(batch);
    }

    /// Delistings scheduled at or before `height`, earliest first.
    pub fn due_delistings(store: &KvStore, height: u64) -> Result<Vec<(u64, String)>> {
        let mut due = Vec::new();
        for (key, _) in store.prefix(&[keys::DELIST_PREFIX]) {
            let (at, symbol) = keys::split_delist_key(key)?;
            if at > height {
                break;
            }
            due.push((at, symbol));
        }
        Ok(due)
    }

    /// Whether any delisting is pending for `symbol`.
    pub fn is_delist_scheduled(store: &KvStore, symbol: &str) -> Result<bool> {
        for (key, _) in store.prefix(&[keys::DELIST_PREFIX]) {
            if keys::split_delist_key(key)?.1 == symbol {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn clear_delisting(store: &mut KvStore, height: u64, symbol: &str) {
        let mut batch = WriteBatch::new();
        batch.delete(keys::delist_key(height, symbol));
        store.write(batch);
    }

    // =================================================================
    // Day tracking
    // =================================================================

    pub fn last_block_day(store: &KvStore) -> Result<Option<i32>> {
        store
            .get(&keys::LAST_BLOCK_DAY_KEY)
            .map(|bytes| decode(bytes, "last block day"))
            .transpose()
    }

    pub fn set_last_block_day(store: &mut KvStore, day: i32) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(keys::LAST_BLOCK_DAY_KEY.to_vec(), serde_json::to_vec(&day)?);
        store.write(batch);
        Ok(())
    }

    /// Record `day` and report whether it starts a new day.
    ///
    /// The very first recorded block never counts as a new day.
    pub fn advance_day(store: &mut KvStore, day: i32) -> Result<bool> {
        let is_new_day = Self::last_block_day(store)?.is_some_and(|last| day > last);
        Self::set_last_block_day(store, day)?;
        Ok(is_new_day)
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ChainbookError::CorruptEntry {
        reason: format!("{what} record: {e}"),
    })
}
