use crate::core::{error::ChainError, storage::ChainState};
use olt_common::{config::SECRET_SIZE, crypto::Address, serializer::ReaderError};
use std::sync::Arc;

const SECRET_PREFIX: &[u8] = b"secret/";

// Node-local persistence of initiator swap secrets, keyed by
// (counter-party, nonce). Lives outside the consensus state so it never
// replicates and never enters the app hash, but survives node restarts
// with in-flight swaps.
#[derive(Clone)]
pub struct SecretStore {
    backend: Arc<ChainState>,
}

impl SecretStore {
    pub fn new(backend: Arc<ChainState>) -> Self {
        Self { backend }
    }

    fn key(counter_party: &Address, nonce: u64) -> Vec<u8> {
        let mut key = [SECRET_PREFIX, counter_party.as_ref()].concat();
        key.extend_from_slice(&nonce.to_be_bytes());
        key
    }

    pub fn get(
        &self,
        counter_party: &Address,
        nonce: u64,
    ) -> Result<Option<[u8; SECRET_SIZE]>, ChainError> {
        match self.backend.local_get(&Self::key(counter_party, nonce))? {
            Some(bytes) => {
                let secret: [u8; SECRET_SIZE] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| ChainError::Reader(ReaderError::InvalidSize))?;
                Ok(Some(secret))
            }
            None => Ok(None),
        }
    }

    pub fn set(
        &self,
        counter_party: &Address,
        nonce: u64,
        secret: &[u8; SECRET_SIZE],
    ) -> Result<(), ChainError> {
        self.backend
            .local_set(&Self::key(counter_party, nonce), secret)
    }

    // Drop the secret once a swap finishes or refunds
    pub fn delete(&self, counter_party: &Address, nonce: u64) -> Result<(), ChainError> {
        self.backend.local_delete(&Self::key(counter_party, nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_survives_reopen_of_store() {
        let backend = ChainState::in_memory().unwrap();
        let store = SecretStore::new(backend.clone());
        let counter_party = Address::new([2; 20]);

        store.set(&counter_party, 1, &[7; 32]).unwrap();
        // a second handle over the same backend sees the secret
        let other = SecretStore::new(backend);
        assert_eq!(other.get(&counter_party, 1).unwrap(), Some([7; 32]));

        other.delete(&counter_party, 1).unwrap();
        assert_eq!(store.get(&counter_party, 1).unwrap(), None);
    }
}
