use super::{delete_key, get_json, set_json, KEY_SEPARATOR};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{crypto::Address, swap::HtlcContract};

// Replicated record of published HTLC contract data, keyed by the
// counter-party account and the swap nonce so both sides can audit
#[derive(Clone)]
pub struct ContractStore {
    state: SharedState,
}

impl ContractStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn key(account: &Address, nonce: u64) -> Vec<u8> {
        let mut key = [prefixes::CONTRACT, account.as_ref()].concat();
        key.push(KEY_SEPARATOR);
        key.extend_from_slice(&nonce.to_be_bytes());
        key
    }

    pub fn get(&self, account: &Address, nonce: u64) -> Result<Option<HtlcContract>, ChainError> {
        get_json(&self.state, &Self::key(account, nonce))
    }

    pub fn set(
        &self,
        account: &Address,
        nonce: u64,
        contract: &HtlcContract,
    ) -> Result<(), ChainError> {
        set_json(&self.state, Self::key(account, nonce), contract)
    }

    pub fn delete(&self, account: &Address, nonce: u64) {
        delete_key(&self.state, Self::key(account, nonce));
    }
}
