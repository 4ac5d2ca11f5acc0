//! System-wide constants for the chainbook matching core.

/// Separator between the owner address and the sequence in an order id.
pub const ORDER_ID_SEPARATOR: char = '-';

/// Bits reserved for the sub-identify byte in an order id's sequence part.
pub const ORDER_IDENTIFY_BITS: u32 = 8;

/// Fixed scale (decimal places) of the order-preserving price key.
pub const PRICE_KEY_SCALE: u32 = 18;

/// Width in bytes of an encoded price key (big-endian `u128`).
pub const PRICE_KEY_LEN: usize = 16;

/// Width in bytes of an encoded block height in index keys.
pub const HEIGHT_KEY_LEN: usize = 8;

/// Default lifetime of a GTE order, in blocks.
pub const DEFAULT_GTE_ORDER_LIFETIME: u64 = 10_000;

/// Default price band half-width around the reference price, in percent.
pub const DEFAULT_MAX_EXECUTED_PRICE_CHANGE_RATIO: u32 = 25;

/// Default (and maximum) number of decimal places a limit price may carry.
pub const DEFAULT_MAX_PRICE_PRECISION: u32 = PRICE_KEY_SCALE;
