use crate::{
    crypto::{Address, Hash},
    currency::ChainKind,
};
use serde::{Deserialize, Serialize};

// State machine of an external chain lock operation
// Finalized is only reachable once witnesses holding at least 2/3 of the
// validator power have attested
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    New,
    BusyBroadcasting,
    BusyFinalizing,
    Finalized,
    Failed,
}

// Persisted record of an in-flight external chain lock
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tracker {
    // Tracker name, the hash of the raw external transaction
    pub name: Hash,
    pub chain: ChainKind,
    pub process_owner: Address,
    // Raw signed external chain transaction to broadcast
    #[serde(with = "hex::serde")]
    pub signed_tx: Vec<u8>,
    pub state: TrackerState,
    // Validators that have attested to the external chain event
    pub witnesses: Vec<Address>,
}

impl Tracker {
    pub fn new(name: Hash, chain: ChainKind, process_owner: Address, signed_tx: Vec<u8>) -> Self {
        Self {
            name,
            chain,
            process_owner,
            signed_tx,
            state: TrackerState::New,
            witnesses: Vec::new(),
        }
    }

    // Record a witness attestation; returns false if already present
    pub fn add_witness(&mut self, validator: Address) -> bool {
        if self.witnesses.contains(&validator) {
            return false;
        }
        self.witnesses.push(validator);
        true
    }

    pub fn has_witness(&self, validator: &Address) -> bool {
        self.witnesses.contains(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_is_deduplicated() {
        let mut tracker = Tracker::new(
            Hash::zero(),
            ChainKind::Ethereum,
            Address::zero(),
            vec![1, 2, 3],
        );
        let validator = Address::new([9; 20]);
        assert!(tracker.add_witness(validator.clone()));
        assert!(!tracker.add_witness(validator.clone()));
        assert_eq!(tracker.witnesses.len(), 1);
        assert!(tracker.has_witness(&validator));
    }
}
