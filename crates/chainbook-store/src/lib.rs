//! # chainbook-store
//!
//! Persistent state of the matching core, laid out over an ordered
//! byte-keyed store.
//!
//! ## Components
//!
//! - [`KvStore`] / [`WriteBatch`]: ordered map with atomic batches and checkpoints
//! - [`OrderIndex`]: per-pair bid, ask and age indices
//! - [`GlobalOrderLookup`]: lookups by order id and by owner
//! - [`MarketStore`]: market records, delisting schedule, last block day
//! - [`keys`]: the key layout shared by all of the above

pub mod global;
pub mod keys;
pub mod kv;
pub mod market_store;
pub mod order_index;

pub use global::GlobalOrderLookup;
pub use kv::{Checkpoint, KvStore, WriteBatch};
pub use market_store::MarketStore;
pub use order_index::{MatchingCandidates, OrderIndex};
