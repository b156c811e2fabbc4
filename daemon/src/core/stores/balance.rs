use super::{get_json, iterate_prefix, set_json};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{balance::Balance, crypto::Address, currency::Coin};

// Mapping from account address to its multi-currency purse
#[derive(Clone)]
pub struct BalanceStore {
    state: SharedState,
}

impl BalanceStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn key(address: &Address) -> Vec<u8> {
        [prefixes::BALANCE, address.as_ref()].concat()
    }

    pub fn get(&self, address: &Address) -> Result<Balance, ChainError> {
        Ok(get_json(&self.state, &Self::key(address))?.unwrap_or_default())
    }

    pub fn set(&self, address: &Address, balance: &Balance) -> Result<(), ChainError> {
        set_json(&self.state, Self::key(address), balance)
    }

    pub fn add_to_address(&self, address: &Address, coin: &Coin) -> Result<(), ChainError> {
        let mut balance = self.get(address)?;
        balance.add_coin(coin)?;
        self.set(address, &balance)
    }

    pub fn minus_from_address(&self, address: &Address, coin: &Coin) -> Result<(), ChainError> {
        let mut balance = self.get(address)?;
        balance.minus_coin(coin)?;
        self.set(address, &balance)
    }

    pub fn iterate(&self) -> Result<Vec<(Address, Balance)>, ChainError> {
        let mut balances = Vec::new();
        for (key, value) in iterate_prefix(&self.state, prefixes::BALANCE)? {
            let address = Address::from_bytes(&key[prefixes::BALANCE.len()..])?;
            let balance = serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            balances.push((address, balance));
        }
        Ok(balances)
    }
}
