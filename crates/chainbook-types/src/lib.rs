//! # chainbook-types
//!
//! Shared types, errors, and configuration for the **chainbook** matching core.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`OrderId`], [`TradingPair`], [`FillId`]
//! - **Order model**: [`Order`], [`OrderSide`], [`TimeInForce`]
//! - **Market model**: [`MarketInfo`], [`Coin`], [`BalanceEntry`]
//! - **Block model**: [`BlockContext`], [`BlockEvent`], [`FillEvent`], [`CancelEvent`], [`BlockReport`]
//! - **Configuration**: [`MarketParams`]
//! - **Errors**: [`ChainbookError`] with `CB_ERR_` prefix codes
//! - **Price keys**: [`price_codec`], the order-preserving price encoding
//! - **Constants**: system-wide limits and defaults

pub mod block;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod market;
pub mod order;
pub mod price_codec;

pub use block::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use market::*;
pub use order::*;

// Constants and the price codec are accessed by module path
// (not re-exported to avoid name collisions).
