use super::{delete_key, get_json, iterate_prefix, set_json, KEY_SEPARATOR};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{
    crypto::{Address, Hash},
    swap::SwapEntity,
    transaction::payload::SwapInitPayload,
};

const UNMATCHED_PREFIX: &[u8] = b"u/";
const MATCHED_PREFIX: &[u8] = b"m/";

// Swap requests and matched swap entities
// An unmatched request is indexed by (counter-party, nonce), so two
// unrelated pairs sharing a counter-party within one block cannot collide
#[derive(Clone)]
pub struct SwapStore {
    state: SharedState,
}

impl SwapStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn unmatched_key(counter_party: &Address, nonce: u64) -> Vec<u8> {
        let mut key = [prefixes::SWAP, UNMATCHED_PREFIX, counter_party.as_ref()].concat();
        key.push(KEY_SEPARATOR);
        key.extend_from_slice(&nonce.to_be_bytes());
        key
    }

    fn matched_key(id: &Hash) -> Vec<u8> {
        [prefixes::SWAP, MATCHED_PREFIX, id.as_ref()].concat()
    }

    // ===== Unmatched requests =====

    pub fn get_unmatched(
        &self,
        counter_party: &Address,
        nonce: u64,
    ) -> Result<Option<SwapInitPayload>, ChainError> {
        get_json(&self.state, &Self::unmatched_key(counter_party, nonce))
    }

    pub fn save_unmatched(&self, request: &SwapInitPayload) -> Result<(), ChainError> {
        set_json(
            &self.state,
            Self::unmatched_key(&request.counter_party.key, request.nonce),
            request,
        )
    }

    pub fn delete_unmatched(&self, counter_party: &Address, nonce: u64) {
        delete_key(&self.state, Self::unmatched_key(counter_party, nonce));
    }

    // ===== Matched swaps =====

    pub fn get(&self, id: &Hash) -> Result<Option<SwapEntity>, ChainError> {
        get_json(&self.state, &Self::matched_key(id))
    }

    pub fn set(&self, swap: &SwapEntity) -> Result<(), ChainError> {
        set_json(&self.state, Self::matched_key(&swap.id()), swap)
    }

    pub fn delete(&self, id: &Hash) {
        delete_key(&self.state, Self::matched_key(id));
    }

    pub fn iterate_matched(&self) -> Result<Vec<SwapEntity>, ChainError> {
        let prefix = [prefixes::SWAP, MATCHED_PREFIX].concat();
        let mut swaps = Vec::new();
        for (_, value) in iterate_prefix(&self.state, &prefix)? {
            let swap = serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            swaps.push(swap);
        }
        Ok(swaps)
    }
}
