//! # chainbook-settlement
//!
//! **Custody plane**: everything that touches balances.
//!
//! The matcher only decides who trades what at which price. This crate
//! turns those decisions into bank calls:
//!
//! - [`BankKeeper`] / [`AssetPolicy`]: the external collaborators
//! - [`SettlementAdapter`]: fill settlement, order freeze and release
//! - [`InMemoryBank`] / [`StaticAssetPolicy`]: in-process implementations
//! - [`SupplyConservation`]: the no-coins-created-or-destroyed check

pub mod adapter;
pub mod collaborators;
pub mod memory;
pub mod supply_conservation;

pub use adapter::SettlementAdapter;
pub use collaborators::{AssetPolicy, BankKeeper};
pub use memory::{InMemoryBank, StaticAssetPolicy};
pub use supply_conservation::SupplyConservation;
