//! Key layout.
//!
//! | Prefix | Layout                                        | Value        |
//! |--------|-----------------------------------------------|--------------|
//! | `0x11` | `order_id`                                    | order (JSON) |
//! | `0x12` | `symbol 0x00 desc_price(16) order_id`         | empty        |
//! | `0x13` | `symbol 0x00 price(16) order_id`              | empty        |
//! | `0x14` | `symbol 0x00 height(8, BE) order_id`          | empty        |
//! | `0x20` | `symbol`                                      | market (JSON)|
//! | `0x21` | `height(8, BE) symbol`                        | empty        |
//! | `0x30` |                                               | day (JSON)   |
//!
//! Symbols never contain `0x00`, so the separator keeps one pair's keys from
//! running into another's whose symbol extends it.

use chainbook_types::constants::{HEIGHT_KEY_LEN, PRICE_KEY_LEN};
use chainbook_types::price_codec::{decode_price, decode_price_desc, encode_price, encode_price_desc};
use chainbook_types::{Address, ChainbookError, OrderId, Result, TradingPair};
use rust_decimal::Decimal;

pub const ORDER_PREFIX: u8 = 0x11;
pub const BID_PREFIX: u8 = 0x12;
pub const ASK_PREFIX: u8 = 0x13;
pub const AGE_PREFIX: u8 = 0x14;
pub const MARKET_PREFIX: u8 = 0x20;
pub const DELIST_PREFIX: u8 = 0x21;
pub const LAST_BLOCK_DAY_KEY: [u8; 1] = [0x30];

const SYMBOL_TERMINATOR: u8 = 0x00;

// =================================================================
// Orders
// =================================================================

#[must_use]
pub fn order_key(id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.as_bytes().len());
    key.push(ORDER_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Prefix covering every order id issued to `owner`.
#[must_use]
pub fn owner_prefix(owner: &Address) -> Vec<u8> {
    let prefix = OrderId::owner_prefix(owner);
    let mut key = Vec::with_capacity(1 + prefix.len());
    key.push(ORDER_PREFIX);
    key.extend_from_slice(prefix.as_bytes());
    key
}

/// Order id stored at the tail of an index key, after `skip` bytes.
pub fn order_id_from_tail(key: &[u8], skip: usize) -> Result<OrderId> {
    let tail = key.get(skip..).ok_or_else(|| corrupt(key, "key shorter than prefix"))?;
    let id = std::str::from_utf8(tail).map_err(|_| corrupt(key, "order id is not utf-8"))?;
    if id.is_empty() {
        return Err(corrupt(key, "empty order id"));
    }
    Ok(OrderId(id.to_owned()))
}

// =================================================================
// Per-pair indices
// =================================================================

fn pair_prefix(tag: u8, pair: &TradingPair) -> Vec<u8> {
    let symbol = pair.symbol();
    let mut key = Vec::with_capacity(2 + symbol.len());
    key.push(tag);
    key.extend_from_slice(symbol.as_bytes());
    key.push(SYMBOL_TERMINATOR);
    key
}

#[must_use]
pub fn bid_prefix(pair: &TradingPair) -> Vec<u8> {
    pair_prefix(BID_PREFIX, pair)
}

#[must_use]
pub fn ask_prefix(pair: &TradingPair) -> Vec<u8> {
    pair_prefix(ASK_PREFIX, pair)
}

#[must_use]
pub fn age_prefix(pair: &TradingPair) -> Vec<u8> {
    pair_prefix(AGE_PREFIX, pair)
}

/// Bid index key. The price part is inverted so ascending keys mean
/// descending prices.
pub fn bid_key(pair: &TradingPair, price: &Decimal, id: &OrderId) -> Result<Vec<u8>> {
    let mut key = bid_prefix(pair);
    key.extend_from_slice(&encode_price_desc(price)?);
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

pub fn ask_key(pair: &TradingPair, price: &Decimal, id: &OrderId) -> Result<Vec<u8>> {
    let mut key = ask_prefix(pair);
    key.extend_from_slice(&encode_price(price)?);
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

#[must_use]
pub fn age_key(pair: &TradingPair, height: u64, id: &OrderId) -> Vec<u8> {
    let mut key = age_height_prefix(pair, height);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Prefix of all age keys at exactly `height`.
///
/// Also the exclusive upper bound of every age key created strictly
/// before `height`.
#[must_use]
pub fn age_height_prefix(pair: &TradingPair, height: u64) -> Vec<u8> {
    let mut key = age_prefix(pair);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// Split a bid index key into its price and order id.
pub fn split_bid_key(prefix_len: usize, key: &[u8]) -> Result<(Decimal, OrderId)> {
    let price_bytes = price_slice(prefix_len, key)?;
    let price = decode_price_desc(price_bytes)?;
    Ok((price, order_id_from_tail(key, prefix_len + PRICE_KEY_LEN)?))
}

/// Split an ask index key into its price and order id.
pub fn split_ask_key(prefix_len: usize, key: &[u8]) -> Result<(Decimal, OrderId)> {
    let price_bytes = price_slice(prefix_len, key)?;
    let price = decode_price(price_bytes)?;
    Ok((price, order_id_from_tail(key, prefix_len + PRICE_KEY_LEN)?))
}

fn price_slice(prefix_len: usize, key: &[u8]) -> Result<&[u8]> {
    key.get(prefix_len..prefix_len + PRICE_KEY_LEN)
        .ok_or_else(|| corrupt(key, "price key truncated"))
}

/// Split an age index key into its height and order id.
pub fn split_age_key(prefix_len: usize, key: &[u8]) -> Result<(u64, OrderId)> {
    let height = read_height(key, prefix_len)?;
    Ok((height, order_id_from_tail(key, prefix_len + HEIGHT_KEY_LEN)?))
}

// =================================================================
// Markets
// =================================================================

#[must_use]
pub fn market_key(symbol: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + symbol.len());
    key.push(MARKET_PREFIX);
    key.extend_from_slice(symbol.as_bytes());
    key
}

#[must_use]
pub fn delist_key(height: u64, symbol: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + HEIGHT_KEY_LEN + symbol.len());
    key.push(DELIST_PREFIX);
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(symbol.as_bytes());
    key
}

/// Split a delist key into its scheduled height and symbol.
pub fn split_delist_key(key: &[u8]) -> Result<(u64, String)> {
    let height = read_height(key, 1)?;
    let symbol = key
        .get(1 + HEIGHT_KEY_LEN..)
        .and_then(|s| std::str::from_utf8(s).ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| corrupt(key, "bad delist symbol"))?;
    Ok((height, symbol.to_owned()))
}

fn read_height(key: &[u8], at: usize) -> Result<u64> {
    let bytes: [u8; HEIGHT_KEY_LEN] = key
        .get(at..at + HEIGHT_KEY_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| corrupt(key, "height truncated"))?;
    Ok(u64::from_be_bytes(bytes))
}

fn corrupt(key: &[u8], what: &str) -> ChainbookError {
    ChainbookError::CorruptEntry {
        reason: format!("{what} in key {}", hex::encode(key)),
    }
}
