//! Supply conservation invariant checker.
//!
//! Invariant after every block:
//! ```text
//! ∀ denom: Σ(available + frozen) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! Matching only moves coins between owners and between an owner's
//! available and frozen balances; if the totals drift, custody is broken.

use std::collections::{BTreeMap, BTreeSet};

use chainbook_types::{ChainbookError, Result};
use rust_decimal::Decimal;

/// Per-denom deposit and withdrawal totals.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    deposits: BTreeMap<String, Decimal>,
    withdrawals: BTreeMap<String, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, denom: &str, amount: Decimal) {
        *self.deposits.entry(denom.to_owned()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn record_withdrawal(&mut self, denom: &str, amount: Decimal) {
        *self.withdrawals.entry(denom.to_owned()).or_insert(Decimal::ZERO) += amount;
    }

    /// Deposits minus withdrawals.
    #[must_use]
    pub fn expected_supply(&self, denom: &str) -> Decimal {
        self.total_deposits(denom) - self.total_withdrawals(denom)
    }

    /// Compare the sum of all balances of `denom` with the expected supply.
    pub fn verify(&self, denom: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(denom);
        if actual_supply != expected {
            return Err(ChainbookError::SupplyInvariantViolation {
                reason: format!(
                    "{denom}: actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.total_deposits(denom),
                    self.total_withdrawals(denom),
                ),
            });
        }
        Ok(())
    }

    /// Every denom ever deposited or withdrawn, sorted.
    #[must_use]
    pub fn tracked_denoms(&self) -> Vec<String> {
        let denoms: BTreeSet<&String> = self.deposits.keys().chain(self.withdrawals.keys()).collect();
        denoms.into_iter().cloned().collect()
    }

    #[must_use]
    pub fn total_deposits(&self, denom: &str) -> Decimal {
        self.deposits.get(denom).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_withdrawals(&self, denom: &str) -> Decimal {
        self.withdrawals.get(denom).copied().unwrap_or(Decimal::ZERO)
    }
}
