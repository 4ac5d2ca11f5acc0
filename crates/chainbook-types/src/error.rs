//! Error types for the chainbook matching core.
//!
//! All errors use the `CB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Market errors
//! - 3xx: Custody / balance errors
//! - 4xx: Encoding / storage errors
//! - 5xx: Matching errors
//! - 9xx: General / internal errors
//!
//! Custody errors abort the whole block ([`ChainbookError::is_block_fatal`]);
//! everything else is reported as a typed failure of the pair it occurred in.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::OrderId;

/// Central error enum for all chainbook operations.
#[derive(Debug, Error)]
pub enum ChainbookError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order is not present in the store.
    #[error("CB_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation before admission.
    #[error("CB_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this id already exists.
    #[error("CB_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The sender does not own the order it tried to cancel.
    #[error("CB_ERR_103: Order {order_id} is not owned by {sender}")]
    NotOrderOwner { order_id: OrderId, sender: String },

    // =================================================================
    // Market Errors (2xx)
    // =================================================================
    /// No trading pair is registered under this symbol.
    #[error("CB_ERR_200: Market not found: {0}")]
    MarketNotFound(String),

    /// A trading pair with this symbol already exists.
    #[error("CB_ERR_201: Market already exists: {0}")]
    DuplicateMarket(String),

    /// The market definition is malformed.
    #[error("CB_ERR_202: Invalid market: {reason}")]
    InvalidMarket { reason: String },

    // =================================================================
    // Custody / Balance Errors (3xx)
    // =================================================================
    /// Not enough available balance to freeze.
    #[error("CB_ERR_300: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Not enough frozen balance to unfreeze.
    #[error("CB_ERR_301: Insufficient frozen balance: need {needed}, have {frozen}")]
    InsufficientFrozen { needed: Decimal, frozen: Decimal },

    /// A freeze / unfreeze / transfer call failed during settlement.
    #[error("CB_ERR_302: Custody failure during {op}: {reason}")]
    Custody { op: &'static str, reason: String },

    /// Total holdings of a denomination no longer match what was deposited.
    #[error("CB_ERR_303: Supply invariant violated: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Encoding / Storage Errors (4xx)
    // =================================================================
    /// The price cannot be represented by the fixed-width price key.
    #[error("CB_ERR_400: Price out of encodable range: {price}")]
    PriceOutOfRange { price: Decimal },

    /// The price carries more decimal places than the price key scale.
    #[error("CB_ERR_401: Price {price} exceeds precision {max_scale}")]
    PricePrecisionExceeded { price: Decimal, max_scale: u32 },

    /// A stored key or value could not be decoded.
    #[error("CB_ERR_402: Corrupt store entry: {reason}")]
    CorruptEntry { reason: String },

    /// Serialization / deserialization error.
    #[error("CB_ERR_403: Serialization error: {0}")]
    Serialization(String),

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// Fixed-point arithmetic overflowed while matching.
    #[error("CB_ERR_500: Arithmetic overflow: {reason}")]
    ArithmeticOverflow { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Configuration error (invalid parameters).
    #[error("CB_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// Unrecoverable internal error.
    #[error("CB_ERR_901: Internal error: {0}")]
    Internal(String),
}

impl ChainbookError {
    /// Whether this error must abort the whole block's state transition.
    ///
    /// Custody failures mean the bank and the order book disagree, which is a
    /// consistency violation elsewhere in the system. Everything else is local
    /// to the pair being processed.
    #[must_use]
    pub fn is_block_fatal(&self) -> bool {
        matches!(
            self,
            Self::Custody { .. }
                | Self::InsufficientFrozen { .. }
                | Self::SupplyInvariantViolation { .. }
                | Self::Internal(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ChainbookError>;

impl From<serde_json::Error> for ChainbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
