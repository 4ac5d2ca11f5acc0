//! New-order message and its stateless checks.

use chainbook_types::{
    Address, ChainbookError, MarketInfo, OrderId, OrderSide, Result, TimeInForce, TradingPair,
};
use rust_decimal::Decimal;

/// A limit order as submitted by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub owner: Address,
    /// Owner's account sequence of the submitting transaction.
    pub sequence: u64,
    /// Distinguishes several orders submitted under one sequence.
    pub identify: u8,
    pub pair: TradingPair,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time_in_force: TimeInForce,
}

impl NewOrder {
    /// A GTE limit order with `identify = 0`.
    #[must_use]
    pub fn limit(
        owner: Address,
        sequence: u64,
        pair: TradingPair,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            owner,
            sequence,
            identify: 0,
            pair,
            side,
            price,
            quantity,
            time_in_force: TimeInForce::Gte,
        }
    }

    #[must_use]
    pub fn ioc(mut self) -> Self {
        self.time_in_force = TimeInForce::Ioc;
        self
    }

    #[must_use]
    pub fn order_id(&self) -> OrderId {
        OrderId::new(&self.owner, self.sequence, self.identify)
    }

    /// Custody the order must freeze: money for bids, stock for asks.
    pub fn frozen_amount(&self) -> Result<Decimal> {
        match self.side {
            OrderSide::Buy => self
                .quantity
                .checked_mul(self.price)
                .ok_or_else(|| ChainbookError::ArithmeticOverflow {
                    reason: format!("{} x {}", self.quantity, self.price),
                }),
            OrderSide::Sell => Ok(self.quantity),
        }
    }

    /// Checks that need only the message and its market.
    pub fn validate(&self, market: &MarketInfo) -> Result<()> {
        if !self.owner.is_valid() {
            return Err(invalid(format!("malformed owner address {:?}", self.owner.as_str())));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(invalid("quantity must be positive".to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(invalid("price must be positive".to_string()));
        }
        if self.price.normalize().scale() > market.price_precision {
            return Err(ChainbookError::PricePrecisionExceeded {
                price: self.price,
                max_scale: market.price_precision,
            });
        }
        // Rejects prices the index cannot key.
        chainbook_types::price_codec::encode_price(&self.price)?;
        self.frozen_amount()?;
        Ok(())
    }
}

fn invalid(reason: String) -> ChainbookError {
    ChainbookError::InvalidOrder { reason }
}
