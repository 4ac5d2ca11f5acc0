//! Identifiers used throughout chainbook.
//!
//! Order ids are plain strings derived from the owner's address and account
//! sequence, so they are globally unique and never reused. The owner address
//! is the id prefix, which is what makes per-owner prefix scans possible.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ORDER_ID_SEPARATOR, ORDER_IDENTIFY_BITS};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Account address of an order owner (bech32 string on chain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses must be non-empty and must not contain the order id separator.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(ORDER_ID_SEPARATOR)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Globally unique order identifier: `"{owner}-{sequence << 8 | identify}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Build the id from the owner, the owner's account sequence and the
    /// sub-identify byte that distinguishes orders sent in one transaction.
    #[must_use]
    pub fn new(owner: &Address, sequence: u64, identify: u8) -> Self {
        let combined = (u128::from(sequence) << ORDER_IDENTIFY_BITS) | u128::from(identify);
        Self(format!("{owner}{ORDER_ID_SEPARATOR}{combined}"))
    }

    /// Prefix shared by every order id of `owner`.
    #[must_use]
    pub fn owner_prefix(owner: &Address) -> String {
        format!("{owner}{ORDER_ID_SEPARATOR}")
    }

    /// The owner part of the id.
    #[must_use]
    pub fn owner(&self) -> Option<Address> {
        self.0
            .rsplit_once(ORDER_ID_SEPARATOR)
            .map(|(owner, _)| Address::new(owner))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TradingPair
// ---------------------------------------------------------------------------

/// A trading pair, e.g. `abc/cet`: `stock` is traded, `money` is paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradingPair {
    pub stock: String,
    pub money: String,
}

impl TradingPair {
    #[must_use]
    pub fn new(stock: impl Into<String>, money: impl Into<String>) -> Self {
        Self {
            stock: stock.into(),
            money: money.into(),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.stock, self.money)
    }

    /// Parse a `stock/money` symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let (stock, money) = symbol.split_once('/')?;
        if stock.is_empty() || money.is_empty() || money.contains('/') {
            return None;
        }
        Some(Self::new(stock, money))
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stock, self.money)
    }
}

// ---------------------------------------------------------------------------
// FillId
// ---------------------------------------------------------------------------

/// Identifier of a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FillId(pub Uuid);

impl FillId {
    /// Deterministic `FillId` from block height, pair and fill sequence.
    ///
    /// Every node derives the same id for the same fill of the same block.
    #[must_use]
    pub fn deterministic(height: u64, pair: &TradingPair, fill_sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let symbol = pair.symbol();
        let mut hasher = Sha256::new();
        hasher.update(b"chainbook:fill_id:v1:");
        hasher.update(height.to_be_bytes());
        hasher.update((symbol.len() as u64).to_be_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(fill_sequence.to_be_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for FillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
