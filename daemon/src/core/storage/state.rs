use super::ChainState;
use crate::core::error::ChainError;
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

pub type SharedState = Arc<RwLock<State>>;

// Copy-on-write overlay captured before each transaction, so a failed
// deliver can roll back without touching earlier transactions of the block
pub struct StateSnapshot {
    cache: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

// A copy-on-write view over the committed chain state
// CheckTx runs on its own State that is reset every block and never
// committed; DeliverTx runs on the deliver State that commits at Commit
pub struct State {
    backend: Arc<ChainState>,
    // None marks a pending delete
    cache: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl State {
    pub fn new(backend: Arc<ChainState>) -> Self {
        Self {
            backend,
            cache: BTreeMap::new(),
        }
    }

    pub fn shared(backend: Arc<ChainState>) -> SharedState {
        Arc::new(RwLock::new(Self::new(backend)))
    }

    pub fn backend(&self) -> &Arc<ChainState> {
        &self.backend
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        if let Some(pending) = self.cache.get(key) {
            return Ok(pending.clone());
        }
        self.backend.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, ChainError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.cache.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.cache.insert(key, None);
    }

    // Merged view of committed pairs and the overlay, in key order
    pub fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ChainError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.backend.iterate_prefix(prefix)?.into_iter().collect();
        for (key, value) in self.cache.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            cache: self.cache.clone(),
        }
    }

    pub fn rollback(&mut self, snapshot: StateSnapshot) {
        self.cache = snapshot.cache;
    }

    // Drop all pending writes (the CheckTx overlay at every new block)
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn pending_writes(&self) -> usize {
        self.cache.len()
    }

    // Apply the overlay to the committed backend and clear it
    pub fn commit(&mut self) -> Result<u64, ChainError> {
        let version = self.backend.apply(&self.cache)?;
        self.cache.clear();
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        State::new(ChainState::in_memory().unwrap())
    }

    #[test]
    fn overlay_reads_win_over_backend() {
        let mut state = state();
        state.set(b"k".to_vec(), b"v1".to_vec());
        state.commit().unwrap();

        state.set(b"k".to_vec(), b"v2".to_vec());
        assert_eq!(state.get(b"k").unwrap(), Some(b"v2".to_vec()));

        state.delete(b"k".to_vec());
        assert_eq!(state.get(b"k").unwrap(), None);
        assert!(!state.exists(b"k").unwrap());
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut state = state();
        state.set(b"a".to_vec(), b"1".to_vec());
        let snapshot = state.snapshot();

        state.set(b"b".to_vec(), b"2".to_vec());
        state.delete(b"a".to_vec());
        state.rollback(snapshot);

        assert_eq!(state.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(state.get(b"b").unwrap(), None);
    }

    #[test]
    fn iterate_merges_overlay_and_backend() {
        let mut state = state();
        state.set(b"p:a".to_vec(), b"1".to_vec());
        state.set(b"p:c".to_vec(), b"3".to_vec());
        state.commit().unwrap();

        state.set(b"p:b".to_vec(), b"2".to_vec());
        state.delete(b"p:c".to_vec());

        let pairs = state.iterate_prefix(b"p:").unwrap();
        assert_eq!(
            pairs,
            vec![
                (b"p:a".to_vec(), b"1".to_vec()),
                (b"p:b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn discarded_overlay_never_persists() {
        let mut state = state();
        state.set(b"k".to_vec(), b"v".to_vec());
        state.reset();
        state.commit().unwrap();
        assert_eq!(state.get(b"k").unwrap(), None);
    }
}
