//! Translate fills and removals into bank calls.
//!
//! For each fill:
//! 1. Seller's frozen stock is unfrozen and transferred to the buyer
//! 2. Buyer's frozen money is unfrozen and transferred to the seller
//!
//! For each order leaving the book, its remaining frozen amount is unfrozen.
//!
//! Any bank failure during settlement or release is reported as
//! [`ChainbookError::Custody`]: the book and the bank disagree, and the
//! caller must abort the block.

use chainbook_types::{Address, ChainbookError, Coin, FillEvent, Order, Result};

use crate::collaborators::BankKeeper;

/// Borrowed view over a bank used to settle one block's effects.
pub struct SettlementAdapter<'a, B: BankKeeper + ?Sized> {
    bank: &'a mut B,
}

impl<'a, B: BankKeeper + ?Sized> SettlementAdapter<'a, B> {
    pub fn new(bank: &'a mut B) -> Self {
        Self { bank }
    }

    /// Reserve custody for a new order.
    ///
    /// Failures here are the submitter's problem (usually not enough
    /// available balance) and are returned unchanged.
    pub fn freeze_for(&mut self, order: &Order) -> Result<Coin> {
        let coin = Coin::new(order.frozen_denom(), order.frozen_amount);
        if !coin.amount.is_zero() {
            self.bank.freeze(&order.owner, &coin)?;
        }
        Ok(coin)
    }

    /// Move the coins of one fill between buyer and seller.
    pub fn settle_fill(&mut self, fill: &FillEvent) -> Result<()> {
        let stock = fill.stock_coin();
        let money = fill.money_coin();

        self.unfreeze(&fill.seller, &stock)?;
        self.transfer(&fill.seller, &fill.buyer, &stock)?;
        self.unfreeze(&fill.buyer, &money)?;
        self.transfer(&fill.buyer, &fill.seller, &money)?;

        tracing::debug!(
            fill_id = %fill.id,
            stock = %stock,
            money = %money,
            "fill settled"
        );
        Ok(())
    }

    /// Return an order's remaining frozen custody to its owner.
    pub fn release(&mut self, order: &Order) -> Result<Coin> {
        let coin = Coin::new(order.frozen_denom(), order.frozen_amount);
        self.unfreeze(&order.owner, &coin)?;
        Ok(coin)
    }

    fn unfreeze(&mut self, owner: &Address, coin: &Coin) -> Result<()> {
        if coin.amount.is_zero() {
            return Ok(());
        }
        self.bank.unfreeze(owner, coin).map_err(|e| custody("unfreeze", owner, coin, &e))
    }

    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<()> {
        if coin.amount.is_zero() {
            return Ok(());
        }
        self.bank
            .transfer(from, to, coin)
            .map_err(|e| custody("transfer", from, coin, &e))
    }
}

fn custody(op: &'static str, owner: &Address, coin: &Coin, err: &ChainbookError) -> ChainbookError {
    tracing::error!(op, owner = %owner, coin = %coin, error = %err, "custody call failed");
    ChainbookError::Custody {
        op,
        reason: format!("{owner} {coin}: {err}"),
    }
}
