mod balance;
mod contract;
mod fee_pool;
mod proposal;
mod proposal_fund;
mod proposal_vote;
mod secret;
mod swap;
mod tracker;
mod validator;

pub use balance::BalanceStore;
pub use contract::ContractStore;
pub use fee_pool::FeePoolStore;
pub use proposal::ProposalStore;
pub use proposal_fund::ProposalFundStore;
pub use proposal_vote::ProposalVoteStore;
pub use secret::SecretStore;
pub use swap::SwapStore;
pub use tracker::TrackerStore;
pub use validator::{Stake, Unstake, Validator, ValidatorStore};

use crate::core::{error::ChainError, storage::SharedState, storage::State};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::RwLockReadGuard;

// Separator between key segments within a store prefix
pub const KEY_SEPARATOR: u8 = b'/';

// Every store is a view over the shared block state under its own prefix.
// Records are stored as JSON; field order of the serialized structs is
// the struct definition order, so encoded bytes are deterministic.

pub(crate) fn read_state(state: &SharedState) -> RwLockReadGuard<'_, State> {
    state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn get_json<T: DeserializeOwned>(
    state: &SharedState,
    key: &[u8],
) -> Result<Option<T>, ChainError> {
    let guard = read_state(state);
    match guard.get(key)? {
        Some(bytes) => Ok(Some(
            serde_json::from_slice(&bytes).map_err(ChainError::Deserialization)?,
        )),
        None => Ok(None),
    }
}

pub(crate) fn set_json<T: Serialize>(
    state: &SharedState,
    key: Vec<u8>,
    value: &T,
) -> Result<(), ChainError> {
    let bytes = serde_json::to_vec(value).map_err(ChainError::Serialization)?;
    let mut guard = state
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.set(key, bytes);
    Ok(())
}

pub(crate) fn delete_key(state: &SharedState, key: Vec<u8>) {
    let mut guard = state
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.delete(key);
}

pub(crate) fn exists_key(state: &SharedState, key: &[u8]) -> Result<bool, ChainError> {
    read_state(state).exists(key)
}

// Collects the pairs first so no lock is held while callers touch other
// stores with the results
pub(crate) fn iterate_prefix(
    state: &SharedState,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ChainError> {
    read_state(state).iterate_prefix(prefix)
}
