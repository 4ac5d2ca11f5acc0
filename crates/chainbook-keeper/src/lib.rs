//! # chainbook-keeper
//!
//! The **market keeper**: owner of the order book and driver of the
//! block-synchronous matching cycle.
//!
//! - [`MarketKeeper::create_market`], [`MarketKeeper::place_order`],
//!   [`MarketKeeper::cancel_order`], [`MarketKeeper::schedule_delist`]:
//!   transaction-time operations
//! - [`MarketKeeper::on_block_end`]: the once-per-block entry point
//!
//! ## Block lifecycle
//!
//! ```text
//! txs ──▶ place / cancel ──▶ on_block_end(height, time, data_hash)
//!                              │
//!             new day? ── yes ─┼─▶ expiry sweep (no matching)
//!                        no ───┼─▶ match every unfrozen pair
//!                              ├─▶ drop this block's IOC leftovers
//!                              ├─▶ delist due pairs
//!                              └─▶ BlockReport { events, event_root }
//! ```
//!
//! Every node that feeds the same transactions and block context gets the
//! same report, byte for byte.

pub mod block_end;
pub mod keeper;
pub mod msg;

pub use keeper::MarketKeeper;
pub use msg::NewOrder;
