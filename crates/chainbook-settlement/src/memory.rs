//! In-memory collaborators for embedding and tests.

use std::collections::{BTreeMap, BTreeSet};

use chainbook_types::{Address, BalanceEntry, ChainbookError, Coin, Result};
use rust_decimal::Decimal;

use crate::collaborators::{AssetPolicy, BankKeeper};
use crate::supply_conservation::SupplyConservation;

/// Bank holding available and frozen balances per `(owner, denom)`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    balances: BTreeMap<(Address, String), BalanceEntry>,
    supply: SupplyConservation,
}

impl InMemoryBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `denom` to the owner's available balance.
    pub fn deposit(&mut self, owner: &Address, denom: &str, amount: Decimal) {
        let entry = self.entry(owner, denom);
        entry.available += amount;
        self.supply.record_deposit(denom, amount);
    }

    /// Debit `amount` of `denom` from the owner's available balance.
    pub fn withdraw(&mut self, owner: &Address, denom: &str, amount: Decimal) -> Result<()> {
        let entry = self.existing_mut(owner, denom);
        let available = entry.as_ref().map_or(Decimal::ZERO, |e| e.available);
        match entry {
            Some(entry) if entry.available >= amount => entry.available -= amount,
            _ => {
                return Err(ChainbookError::InsufficientBalance {
                    needed: amount,
                    available,
                });
            }
        }
        self.supply.record_withdrawal(denom, amount);
        Ok(())
    }

    #[must_use]
    pub fn balance(&self, owner: &Address, denom: &str) -> BalanceEntry {
        self.balances
            .get(&(owner.clone(), denom.to_owned()))
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of available and frozen balances of `denom` across all owners.
    #[must_use]
    pub fn total_supply(&self, denom: &str) -> Decimal {
        self.balances
            .iter()
            .filter(|((_, d), _)| d == denom)
            .map(|(_, entry)| entry.total())
            .sum()
    }

    /// Sum of frozen balances of `denom` across all owners.
    #[must_use]
    pub fn total_frozen(&self, denom: &str) -> Decimal {
        self.balances
            .iter()
            .filter(|((_, d), _)| d == denom)
            .map(|(_, entry)| entry.frozen)
            .sum()
    }

    pub fn verify_supply(&self, denom: &str) -> Result<()> {
        self.supply.verify(denom, self.total_supply(denom))
    }

    /// Check conservation for every denom the bank has seen.
    pub fn verify_all(&self) -> Result<()> {
        self.supply
            .tracked_denoms()
            .iter()
            .try_for_each(|denom| self.verify_supply(denom))
    }

    fn entry(&mut self, owner: &Address, denom: &str) -> &mut BalanceEntry {
        self.balances
            .entry((owner.clone(), denom.to_owned()))
            .or_insert_with(BalanceEntry::new)
    }

    fn existing_mut(&mut self, owner: &Address, denom: &str) -> Option<&mut BalanceEntry> {
        self.balances.get_mut(&(owner.clone(), denom.to_owned()))
    }
}

impl BankKeeper for InMemoryBank {
    fn freeze(&mut self, owner: &Address, coin: &Coin) -> Result<()> {
        let Some(entry) = self.existing_mut(owner, &coin.denom) else {
            return Err(ChainbookError::InsufficientBalance {
                needed: coin.amount,
                available: Decimal::ZERO,
            });
        };
        if entry.available < coin.amount {
            return Err(ChainbookError::InsufficientBalance {
                needed: coin.amount,
                available: entry.available,
            });
        }
        entry.available -= coin.amount;
        entry.frozen += coin.amount;
        Ok(())
    }

    fn unfreeze(&mut self, owner: &Address, coin: &Coin) -> Result<()> {
        let Some(entry) = self.existing_mut(owner, &coin.denom) else {
            return Err(ChainbookError::InsufficientFrozen {
                needed: coin.amount,
                frozen: Decimal::ZERO,
            });
        };
        if entry.frozen < coin.amount {
            return Err(ChainbookError::InsufficientFrozen {
                needed: coin.amount,
                frozen: entry.frozen,
            });
        }
        entry.frozen -= coin.amount;
        entry.available += coin.amount;
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<()> {
        {
            let Some(source) = self.existing_mut(from, &coin.denom) else {
                return Err(ChainbookError::InsufficientBalance {
                    needed: coin.amount,
                    available: Decimal::ZERO,
                });
            };
            if source.available < coin.amount {
                return Err(ChainbookError::InsufficientBalance {
                    needed: coin.amount,
                    available: source.available,
                });
            }
            source.available -= coin.amount;
        }
        self.entry(to, &coin.denom).available += coin.amount;
        Ok(())
    }
}

/// Asset policy backed by fixed sets.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetPolicy {
    forbidden: BTreeSet<(String, Address)>,
    frozen_tokens: BTreeSet<String>,
}

impl StaticAssetPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forbid(&mut self, denom: &str, owner: &Address) {
        self.forbidden.insert((denom.to_owned(), owner.clone()));
    }

    pub fn allow(&mut self, denom: &str, owner: &Address) {
        self.forbidden.remove(&(denom.to_owned(), owner.clone()));
    }

    pub fn freeze_token(&mut self, denom: &str) {
        self.frozen_tokens.insert(denom.to_owned());
    }

    pub fn unfreeze_token(&mut self, denom: &str) {
        self.frozen_tokens.remove(denom);
    }
}

impl AssetPolicy for StaticAssetPolicy {
    fn is_trading_forbidden(&self, denom: &str, owner: &Address) -> bool {
        self.forbidden.contains(&(denom.to_owned(), owner.clone()))
    }

    fn is_token_frozen(&self, denom: &str) -> bool {
        self.frozen_tokens.contains(denom)
    }
}
