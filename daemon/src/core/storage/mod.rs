mod state;

pub use state::{SharedState, State, StateSnapshot};

use crate::core::error::ChainError;
use log::{debug, trace};
use olt_common::crypto::{hash, Hash};
use std::{collections::BTreeMap, path::Path, sync::Arc};

// Store prefixes within the consensus state
// The order of STORE_ORDER is the app-hash order and must never change
// between releases without a coordinated upgrade
pub mod prefixes {
    pub const BALANCE: &[u8] = b"bal:";
    pub const VALIDATOR: &[u8] = b"val:";
    pub const PROPOSAL: &[u8] = b"gov:prop:";
    pub const PROPOSAL_FUND: &[u8] = b"gov:fund:";
    pub const PROPOSAL_VOTE: &[u8] = b"gov:vote:";
    pub const BTC_TRACKER: &[u8] = b"trk:btc:";
    pub const ETH_TRACKER: &[u8] = b"trk:eth:";
    pub const SWAP: &[u8] = b"swap:";
    pub const CONTRACT: &[u8] = b"htlc:";
    pub const FEE: &[u8] = b"fee:";
}

pub const STORE_ORDER: [&[u8]; 10] = [
    prefixes::BALANCE,
    prefixes::VALIDATOR,
    prefixes::PROPOSAL,
    prefixes::PROPOSAL_FUND,
    prefixes::PROPOSAL_VOTE,
    prefixes::BTC_TRACKER,
    prefixes::ETH_TRACKER,
    prefixes::SWAP,
    prefixes::CONTRACT,
    prefixes::FEE,
];

const VERSION_KEY: &[u8] = b"version";

// The committed, versioned key-value state
// Single writer during block delivery; reads are lock-free sled reads.
// The `local` tree holds node-local data (swap secrets, job queue) that
// is never part of the app hash.
pub struct ChainState {
    db: sled::Db,
    state: sled::Tree,
    meta: sled::Tree,
    local: sled::Tree,
}

impl ChainState {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>, ChainError> {
        let db = sled::open(path).map_err(ChainError::GettingRecord)?;
        Self::from_db(db)
    }

    // Volatile backend used by tests and the simulator
    pub fn in_memory() -> Result<Arc<Self>, ChainError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(ChainError::GettingRecord)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Arc<Self>, ChainError> {
        let state = db.open_tree("state").map_err(ChainError::GettingRecord)?;
        let meta = db.open_tree("meta").map_err(ChainError::GettingRecord)?;
        let local = db.open_tree("local").map_err(ChainError::GettingRecord)?;
        Ok(Arc::new(Self {
            db,
            state,
            meta,
            local,
        }))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self
            .state
            .get(key)
            .map_err(ChainError::GettingRecord)?
            .map(|value| value.to_vec()))
    }

    // All committed pairs under a prefix, in key order
    pub fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ChainError> {
        let mut pairs = Vec::new();
        for item in self.state.scan_prefix(prefix) {
            let (key, value) = item.map_err(ChainError::GettingRecord)?;
            pairs.push((key.to_vec(), value.to_vec()));
        }
        Ok(pairs)
    }

    pub fn version(&self) -> Result<u64, ChainError> {
        Ok(self
            .meta
            .get(VERSION_KEY)
            .map_err(ChainError::GettingRecord)?
            .map(|value| {
                let bytes: [u8; 8] = value.as_ref().try_into().unwrap_or_default();
                u64::from_be_bytes(bytes)
            })
            .unwrap_or(0))
    }

    // Apply a batch of overlay writes atomically and bump the version
    pub fn apply(
        &self,
        writes: &BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    ) -> Result<u64, ChainError> {
        let mut batch = sled::Batch::default();
        for (key, value) in writes {
            match value {
                Some(value) => batch.insert(key.as_slice(), value.as_slice()),
                None => batch.remove(key.as_slice()),
            }
        }
        self.state
            .apply_batch(batch)
            .map_err(ChainError::SettingRecord)?;

        let version = self.version()? + 1;
        self.meta
            .insert(VERSION_KEY, &version.to_be_bytes()[..])
            .map_err(ChainError::SettingRecord)?;
        self.db.flush().map_err(ChainError::SettingRecord)?;

        debug!("state committed at version {}", version);
        Ok(version)
    }

    // Root hash of one store: SHA-256 over its length-framed (key, value)
    // stream in key order. A pure function of committed contents.
    pub fn store_root(&self, prefix: &[u8]) -> Result<Hash, ChainError> {
        let mut stream = Vec::new();
        for (key, value) in self.iterate_prefix(prefix)? {
            stream.extend_from_slice(&(key.len() as u32).to_be_bytes());
            stream.extend_from_slice(&key);
            stream.extend_from_slice(&(value.len() as u32).to_be_bytes());
            stream.extend_from_slice(&value);
        }
        trace!(
            "store root over {} bytes for prefix {}",
            stream.len(),
            String::from_utf8_lossy(prefix)
        );
        Ok(hash(&stream))
    }

    // ===== Node-local tree (not replicated, excluded from the app hash) =====

    pub fn local_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self
            .local
            .get(key)
            .map_err(ChainError::GettingRecord)?
            .map(|value| value.to_vec()))
    }

    pub fn local_set(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.local
            .insert(key, value)
            .map_err(ChainError::SettingRecord)?;
        Ok(())
    }

    pub fn local_delete(&self, key: &[u8]) -> Result<(), ChainError> {
        self.local.remove(key).map_err(ChainError::DeletingRecord)?;
        Ok(())
    }

    pub fn local_iterate_prefix(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ChainError> {
        let mut pairs = Vec::new();
        for item in self.local.scan_prefix(prefix) {
            let (key, value) = item.map_err(ChainError::GettingRecord)?;
            pairs.push((key.to_vec(), value.to_vec()));
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_increases_monotonically() {
        let chain = ChainState::in_memory().unwrap();
        assert_eq!(chain.version().unwrap(), 0);

        let mut writes = BTreeMap::new();
        writes.insert(b"bal:a".to_vec(), Some(b"1".to_vec()));
        assert_eq!(chain.apply(&writes).unwrap(), 1);
        assert_eq!(chain.apply(&writes).unwrap(), 2);
    }

    #[test]
    fn store_root_tracks_contents() {
        let chain = ChainState::in_memory().unwrap();
        let empty = chain.store_root(prefixes::BALANCE).unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(b"bal:a".to_vec(), Some(b"1".to_vec()));
        chain.apply(&writes).unwrap();
        let one = chain.store_root(prefixes::BALANCE).unwrap();
        assert_ne!(empty, one);

        // deleting restores the empty root
        let mut deletes = BTreeMap::new();
        deletes.insert(b"bal:a".to_vec(), None);
        chain.apply(&deletes).unwrap();
        assert_eq!(chain.store_root(prefixes::BALANCE).unwrap(), empty);
    }

    #[test]
    fn local_tree_does_not_affect_roots() {
        let chain = ChainState::in_memory().unwrap();
        let before = chain.store_root(prefixes::BALANCE).unwrap();
        chain.local_set(b"bal:secret", b"s").unwrap();
        assert_eq!(chain.store_root(prefixes::BALANCE).unwrap(), before);
    }

    #[test]
    fn committed_state_survives_reopen() {
        let dir = tempdir::TempDir::new("olt-state").unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(b"bal:a".to_vec(), Some(b"42".to_vec()));
        let root = {
            let chain = ChainState::open(dir.path()).unwrap();
            chain.apply(&writes).unwrap();
            chain.store_root(prefixes::BALANCE).unwrap()
        };

        let reopened = ChainState::open(dir.path()).unwrap();
        assert_eq!(reopened.version().unwrap(), 1);
        assert_eq!(reopened.get(b"bal:a").unwrap(), Some(b"42".to_vec()));
        assert_eq!(reopened.store_root(prefixes::BALANCE).unwrap(), root);
    }
}
