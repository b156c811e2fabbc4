use super::{get_json, set_json};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{balance::Balance, currency::Coin};

const POOL_KEY: &[u8] = b"pool";

// Accumulates debited transaction fees and enacted proposal funds
#[derive(Clone)]
pub struct FeePoolStore {
    state: SharedState,
}

impl FeePoolStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn key() -> Vec<u8> {
        [prefixes::FEE, POOL_KEY].concat()
    }

    pub fn get_pool(&self) -> Result<Balance, ChainError> {
        Ok(get_json(&self.state, &Self::key())?.unwrap_or_default())
    }

    pub fn add_to_pool(&self, coin: &Coin) -> Result<(), ChainError> {
        let mut pool = self.get_pool()?;
        pool.add_coin(coin)?;
        set_json(&self.state, Self::key(), &pool)
    }
}
