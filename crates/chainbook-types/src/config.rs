//! Market module parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ChainbookError, Result, constants};

/// Parameters shared by every trading pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Blocks a GTE order may rest before the daily sweep removes it.
    pub gte_order_lifetime: u64,
    /// Half-width `k` of the price band around the reference price, in percent.
    pub max_executed_price_change_ratio: u32,
    /// Maximum decimal places any pair may allow on limit prices.
    pub max_price_precision: u32,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            gte_order_lifetime: constants::DEFAULT_GTE_ORDER_LIFETIME,
            max_executed_price_change_ratio: constants::DEFAULT_MAX_EXECUTED_PRICE_CHANGE_RATIO,
            max_price_precision: constants::DEFAULT_MAX_PRICE_PRECISION,
        }
    }
}

impl MarketParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.gte_order_lifetime == 0 {
            return Err(ChainbookError::Configuration(
                "gte_order_lifetime must be positive".into(),
            ));
        }
        if self.max_executed_price_change_ratio >= 100 {
            return Err(ChainbookError::Configuration(format!(
                "max_executed_price_change_ratio must be below 100, got {}",
                self.max_executed_price_change_ratio
            )));
        }
        if self.max_price_precision > constants::PRICE_KEY_SCALE {
            return Err(ChainbookError::Configuration(format!(
                "max_price_precision must be at most {}, got {}",
                constants::PRICE_KEY_SCALE,
                self.max_price_precision
            )));
        }
        Ok(())
    }

    /// The band ratio `k` as a fraction (25 -> 0.25).
    #[must_use]
    pub fn price_band_ratio(&self) -> Decimal {
        Decimal::from(self.max_executed_price_change_ratio) / Decimal::ONE_HUNDRED
    }
}
