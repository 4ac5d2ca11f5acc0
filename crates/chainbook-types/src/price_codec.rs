//! Order-preserving fixed-width encoding of prices.
//!
//! Index keys embed prices so that a byte-wise range scan over the store is
//! the same as a numeric range scan. A price is rescaled to
//! [`PRICE_KEY_SCALE`] decimal places and written as a big-endian `u128`:
//!
//! ```text
//! encode(p) = (p * 10^18) as u128, big-endian, 16 bytes
//! ```
//!
//! For non-negative prices `a < b  <=>  encode(a) < encode(b)` byte-wise,
//! independent of the scale the `Decimal` happens to carry (`1.0` and `1`
//! encode identically).
//!
//! # Preconditions
//!
//! - the price is non-negative
//! - the price has at most 18 significant decimal places
//! - `price * 10^18` fits in a `u128`, i.e. the price is below
//!   `u128::MAX / 10^18` (about `3.4 * 10^20`)
//!
//! Violations return [`ChainbookError::PriceOutOfRange`] or
//! [`ChainbookError::PricePrecisionExceeded`]; nothing in here panics.

use rust_decimal::Decimal;

use crate::{
    ChainbookError, Result,
    constants::{PRICE_KEY_LEN, PRICE_KEY_SCALE},
};

/// Encode a price into its 16-byte order-preserving key.
pub fn encode_price(price: &Decimal) -> Result<[u8; PRICE_KEY_LEN]> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ChainbookError::PriceOutOfRange { price: *price });
    }
    let normalized = price.normalize();
    let scale = normalized.scale();
    if scale > PRICE_KEY_SCALE {
        return Err(ChainbookError::PricePrecisionExceeded {
            price: *price,
            max_scale: PRICE_KEY_SCALE,
        });
    }

    let mantissa = normalized.mantissa().unsigned_abs();
    let scaled = 10u128
        .checked_pow(PRICE_KEY_SCALE - scale)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or(ChainbookError::PriceOutOfRange { price: *price })?;
    Ok(scaled.to_be_bytes())
}

/// Decode a 16-byte price key back into a normalized `Decimal`.
pub fn decode_price(bytes: &[u8]) -> Result<Decimal> {
    let raw: [u8; PRICE_KEY_LEN] = bytes.try_into().map_err(|_| ChainbookError::CorruptEntry {
        reason: format!("price key must be {PRICE_KEY_LEN} bytes, got {}", bytes.len()),
    })?;
    let mut value = u128::from_be_bytes(raw);
    let mut scale = PRICE_KEY_SCALE;
    while scale > 0 && value % 10 == 0 && value != 0 {
        value /= 10;
        scale -= 1;
    }
    if value == 0 {
        return Ok(Decimal::ZERO);
    }

    let corrupt = || ChainbookError::CorruptEntry {
        reason: format!("price key {} is not a representable price", hex::encode(raw)),
    };
    let signed = i128::try_from(value).map_err(|_| corrupt())?;
    Decimal::try_from_i128_with_scale(signed, scale).map_err(|_| corrupt())
}

/// Encode a price so that ascending byte order is descending price order.
///
/// Used for the bid index, where the best (highest) price must come first.
pub fn encode_price_desc(price: &Decimal) -> Result<[u8; PRICE_KEY_LEN]> {
    Ok(invert(encode_price(price)?))
}

/// Inverse of [`encode_price_desc`].
pub fn decode_price_desc(bytes: &[u8]) -> Result<Decimal> {
    let raw: [u8; PRICE_KEY_LEN] = bytes.try_into().map_err(|_| ChainbookError::CorruptEntry {
        reason: format!("price key must be {PRICE_KEY_LEN} bytes, got {}", bytes.len()),
    })?;
    decode_price(&invert(raw))
}

fn invert(mut bytes: [u8; PRICE_KEY_LEN]) -> [u8; PRICE_KEY_LEN] {
    for b in &mut bytes {
        *b = !*b;
    }
    bytes
}
