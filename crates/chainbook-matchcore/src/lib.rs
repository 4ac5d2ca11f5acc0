//! # chainbook-matchcore
//!
//! **Pure deterministic call-auction matcher.**
//!
//! Once per block and pair, every crossing order trades at a single
//! uniform clearing price. This crate computes that price and the fills,
//! and nothing else:
//!
//! - **No side effects**: no store writes, no custody calls
//! - **Deterministic output**: same candidates, band and block hash give
//!   byte-identical fills on every node
//! - **Fixed-point only**: all arithmetic on `rust_decimal::Decimal`

pub mod clearing;
pub mod determinism;
pub mod matcher;
pub mod price_point;

pub use clearing::{ClearingResult, ClearingRule, PriceBand, compute_clearing_price};
pub use determinism::{compute_event_root, sort_by_priority, tie_break_hash, verify_event_root};
pub use matcher::{MatchInput, MatchOutcome, match_orders};
pub use price_point::{PricePoint, build_price_points};
