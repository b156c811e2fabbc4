use crate::currency::{Amount, Coin};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Error, Formatter};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Balance overflow")]
    Overflow,

    #[error("Insufficient balance of {currency}: need {need}, have {have}")]
    Insufficient {
        currency: String,
        need: Amount,
        have: Amount,
    },
}

// Multi-currency purse of one account
// Invariant: no coin balance is ever negative; a debit below zero is
// rejected before the purse is touched
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    coins: IndexMap<String, Amount>,
}

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_coin(&self, currency: &str) -> Amount {
        self.coins.get(currency).copied().unwrap_or_default()
    }

    pub fn add_coin(&mut self, coin: &Coin) -> Result<(), BalanceError> {
        let current = self.get_coin(&coin.currency);
        let updated = current
            .checked_add(&coin.value)
            .ok_or(BalanceError::Overflow)?;
        self.coins.insert(coin.currency.clone(), updated);
        Ok(())
    }

    pub fn minus_coin(&mut self, coin: &Coin) -> Result<(), BalanceError> {
        let current = self.get_coin(&coin.currency);
        let updated = current
            .checked_sub(&coin.value)
            .ok_or_else(|| BalanceError::Insufficient {
                currency: coin.currency.clone(),
                need: coin.value,
                have: current,
            })?;
        self.coins.insert(coin.currency.clone(), updated);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.coins.values().all(|amount| amount.is_zero())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Amount)> {
        self.coins.iter()
    }
}

impl Display for Balance {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let coins: Vec<String> = self
            .coins
            .iter()
            .map(|(currency, amount)| format!("{} {}", amount, currency))
            .collect();
        write!(f, "[{}]", coins.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_minus() {
        let mut balance = Balance::new();
        balance
            .add_coin(&Coin::new("OLT", Amount::from_u64(100)))
            .unwrap();
        balance
            .minus_coin(&Coin::new("OLT", Amount::from_u64(40)))
            .unwrap();
        assert_eq!(balance.get_coin("OLT"), Amount::from_u64(60));
    }

    #[test]
    fn minus_below_zero_is_rejected() {
        let mut balance = Balance::new();
        balance
            .add_coin(&Coin::new("OLT", Amount::from_u64(10)))
            .unwrap();
        let err = balance
            .minus_coin(&Coin::new("OLT", Amount::from_u64(11)))
            .unwrap_err();
        assert!(matches!(err, BalanceError::Insufficient { .. }));
        // purse untouched on failure
        assert_eq!(balance.get_coin("OLT"), Amount::from_u64(10));
    }

    #[test]
    fn unknown_currency_is_zero() {
        let balance = Balance::new();
        assert_eq!(balance.get_coin("BTC"), Amount::zero());
    }
}
