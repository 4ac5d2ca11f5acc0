//! Interfaces to the chain modules the matching core depends on.
//!
//! The bank owns every balance; the matching core only asks it to move
//! coins between an owner's available and frozen balances and between
//! owners. The asset policy answers issuer-level questions about tokens.

use chainbook_types::{Address, Coin, Result};

/// Custody operations provided by the chain's bank module.
pub trait BankKeeper {
    /// Move `coin` from the owner's available balance to frozen.
    fn freeze(&mut self, owner: &Address, coin: &Coin) -> Result<()>;

    /// Move `coin` from the owner's frozen balance back to available.
    fn unfreeze(&mut self, owner: &Address, coin: &Coin) -> Result<()>;

    /// Move `coin` from `from`'s available balance to `to`'s.
    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<()>;
}

/// Issuer controls over tokens.
pub trait AssetPolicy {
    /// Whether the issuer of `denom` forbids `owner` from trading it.
    fn is_trading_forbidden(&self, denom: &str, owner: &Address) -> bool;

    /// Whether the issuer has frozen all activity on `denom`.
    fn is_token_frozen(&self, _denom: &str) -> bool {
        false
    }
}
