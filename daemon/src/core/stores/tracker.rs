use super::{delete_key, get_json, iterate_prefix, set_json};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{
    config::{WITNESS_RATIO_DEN, WITNESS_RATIO_NUM},
    crypto::{Address, Hash},
    tracker::{Tracker, TrackerState},
};

// External chain lock records, one store instance per chain prefix
#[derive(Clone)]
pub struct TrackerStore {
    state: SharedState,
    prefix: &'static [u8],
}

impl TrackerStore {
    pub fn new_btc(state: SharedState) -> Self {
        Self {
            state,
            prefix: prefixes::BTC_TRACKER,
        }
    }

    pub fn new_eth(state: SharedState) -> Self {
        Self {
            state,
            prefix: prefixes::ETH_TRACKER,
        }
    }

    fn key(&self, name: &Hash) -> Vec<u8> {
        [self.prefix, name.as_ref()].concat()
    }

    pub fn get(&self, name: &Hash) -> Result<Option<Tracker>, ChainError> {
        get_json(&self.state, &self.key(name))
    }

    pub fn set(&self, tracker: &Tracker) -> Result<(), ChainError> {
        set_json(&self.state, self.key(&tracker.name), tracker)
    }

    pub fn delete(&self, name: &Hash) {
        delete_key(&self.state, self.key(name));
    }

    pub fn iterate(&self) -> Result<Vec<Tracker>, ChainError> {
        let mut trackers = Vec::new();
        for (_, value) in iterate_prefix(&self.state, self.prefix)? {
            let tracker = serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            trackers.push(tracker);
        }
        Ok(trackers)
    }

    // Record a witness attestation and finalize once the witnesses hold
    // at least 2/3 of the total validator power
    pub fn add_witness(
        &self,
        name: &Hash,
        validator: Address,
        power_of: impl Fn(&Address) -> i64,
        total_power: i64,
    ) -> Result<TrackerState, ChainError> {
        let mut tracker = self
            .get(name)?
            .ok_or_else(|| ChainError::TrackerNotFound(name.clone()))?;

        match tracker.state {
            TrackerState::Finalized | TrackerState::Failed => {
                return Err(ChainError::TrackerFinalState)
            }
            _ => {}
        }

        tracker.add_witness(validator);
        let witness_power: i64 = tracker
            .witnesses
            .iter()
            .map(|address| power_of(address))
            .sum();

        if witness_power as u64 * WITNESS_RATIO_DEN >= total_power.max(0) as u64 * WITNESS_RATIO_NUM
            && total_power > 0
        {
            tracker.state = TrackerState::Finalized;
        } else {
            // the first attestation implies the broadcast was observed;
            // further ones accumulate towards finalization
            tracker.state = match tracker.state {
                TrackerState::New => TrackerState::BusyBroadcasting,
                _ => TrackerState::BusyFinalizing,
            };
        }

        let state = tracker.state;
        self.set(&tracker)?;
        Ok(state)
    }
}
