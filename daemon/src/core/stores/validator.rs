use super::{delete_key, get_json, iterate_prefix, set_json};
use crate::core::{
    driver::ValidatorUpdate,
    error::ChainError,
    storage::{prefixes, SharedState},
};
use log::{debug, info, warn};
use olt_common::{
    crypto::{Address, EcdsaPubKey, PublicKey},
    currency::Amount,
};
use serde::{Deserialize, Serialize};

const SET_PREFIX: &[u8] = b"set:";
const REPORTED_KEY: &[u8] = b"meta:reported";

// A staked validator
// Power is the integer voting weight and always equals the staked VT
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    pub address: Address,
    pub stake_address: Address,
    pub pubkey: PublicKey,
    #[serde(default)]
    pub ecdsa_pubkey: EcdsaPubKey,
    pub name: String,
    pub staked: Amount,
    pub power: i64,
}

pub struct Stake {
    pub validator_address: Address,
    pub stake_address: Address,
    pub pubkey: PublicKey,
    pub ecdsa_pubkey: EcdsaPubKey,
    pub name: String,
    pub amount: Amount,
}

pub struct Unstake {
    pub address: Address,
    pub amount: Amount,
}

// Snapshot of the table last reported to the consensus driver, persisted
// so the EndBlock diff is deterministic from committed state
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct ReportedSet {
    validators: Vec<(Address, PublicKey, i64)>,
}

// Validator table plus the stake lifecycle
#[derive(Clone)]
pub struct ValidatorStore {
    state: SharedState,
}

impl ValidatorStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn key(address: &Address) -> Vec<u8> {
        [prefixes::VALIDATOR, SET_PREFIX, address.as_ref()].concat()
    }

    fn reported_key() -> Vec<u8> {
        [prefixes::VALIDATOR, REPORTED_KEY].concat()
    }

    pub fn get(&self, address: &Address) -> Result<Option<Validator>, ChainError> {
        get_json(&self.state, &Self::key(address))
    }

    pub fn set(&self, validator: &Validator) -> Result<(), ChainError> {
        set_json(&self.state, Self::key(&validator.address), validator)
    }

    // The full validator table in address order
    pub fn get_validator_set(&self) -> Result<Vec<Validator>, ChainError> {
        let prefix = [prefixes::VALIDATOR, SET_PREFIX].concat();
        let mut validators = Vec::new();
        for (_, value) in iterate_prefix(&self.state, &prefix)? {
            let validator: Validator =
                serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            validators.push(validator);
        }
        Ok(validators)
    }

    pub fn get_validator_addresses(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self
            .get_validator_set()?
            .into_iter()
            .map(|validator| validator.address)
            .collect())
    }

    // Cumulative power of the current set
    pub fn total_power(&self) -> Result<i64, ChainError> {
        Ok(self
            .get_validator_set()?
            .iter()
            .map(|validator| validator.power)
            .sum())
    }

    // Add stake to an existing validator or insert a new one
    pub fn handle_stake(&self, stake: Stake) -> Result<(), ChainError> {
        let validator = match self.get(&stake.validator_address)? {
            Some(mut existing) => {
                existing.staked = existing
                    .staked
                    .checked_add(&stake.amount)
                    .ok_or_else(|| {
                        ChainError::NotEnoughFund(olt_common::balance::BalanceError::Overflow)
                    })?;
                existing.power = existing.staked.as_power();
                existing
            }
            None => {
                let power = stake.amount.as_power();
                Validator {
                    address: stake.validator_address,
                    stake_address: stake.stake_address,
                    pubkey: stake.pubkey,
                    ecdsa_pubkey: stake.ecdsa_pubkey,
                    name: stake.name,
                    staked: stake.amount,
                    power,
                }
            }
        };
        debug!(
            "validator {} staked, power is now {}",
            validator.address, validator.power
        );
        self.set(&validator)
    }

    // Subtract stake; the validator is emitted as removed at the next
    // EndBlock once its power reaches zero
    pub fn handle_unstake(&self, unstake: Unstake) -> Result<(), ChainError> {
        let mut validator = self
            .get(&unstake.address)?
            .ok_or(ChainError::ValidatorNotFound)?;
        validator.staked = validator
            .staked
            .checked_sub(&unstake.amount)
            .ok_or(ChainError::UnstakeTooLarge)?;
        validator.power = validator.staked.as_power();
        debug!(
            "validator {} unstaked, power is now {}",
            validator.address, validator.power
        );
        self.set(&validator)
    }

    // Record the block's signers and slash byzantine evidence
    pub fn set_begin_block(
        &self,
        signers: &[Address],
        byzantine: &[Address],
    ) -> Result<(), ChainError> {
        debug!(
            "begin block with {} signers, {} byzantine",
            signers.len(),
            byzantine.len()
        );
        for address in byzantine {
            if let Some(mut validator) = self.get(address)? {
                warn!("slashing byzantine validator {}", address);
                validator.staked = Amount::zero();
                validator.power = 0;
                self.set(&validator)?;
            }
        }
        Ok(())
    }

    // The diff between the committed table and the table last reported to
    // the driver; a Power=0 update removes a validator on the driver side
    pub fn get_end_block_update(&self) -> Result<Vec<ValidatorUpdate>, ChainError> {
        let current = self.get_validator_set()?;
        let reported: ReportedSet =
            get_json(&self.state, &Self::reported_key())?.unwrap_or_default();

        let mut updates = Vec::new();
        for validator in &current {
            let previous = reported
                .validators
                .iter()
                .find(|(address, _, _)| *address == validator.address);
            match previous {
                Some((_, _, power)) if *power == validator.power => {}
                _ => updates.push(ValidatorUpdate {
                    pubkey: validator.pubkey.clone(),
                    power: validator.power,
                }),
            }
        }
        for (address, pubkey, _) in &reported.validators {
            if !current.iter().any(|validator| validator.address == *address) {
                updates.push(ValidatorUpdate {
                    pubkey: pubkey.clone(),
                    power: 0,
                });
            }
        }

        // drop zero-power entries from the table and persist the new
        // reported snapshot
        for validator in &current {
            if validator.power == 0 {
                info!("removing validator {} from the set", validator.address);
                delete_key(&self.state, Self::key(&validator.address));
            }
        }
        let next = ReportedSet {
            validators: current
                .iter()
                .filter(|validator| validator.power > 0)
                .map(|validator| {
                    (
                        validator.address.clone(),
                        validator.pubkey.clone(),
                        validator.power,
                    )
                })
                .collect(),
        };
        set_json(&self.state, Self::reported_key(), &next)?;

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{ChainState, State};
    use olt_common::crypto::KeyPair;

    fn store() -> ValidatorStore {
        ValidatorStore::new(State::shared(ChainState::in_memory().unwrap()))
    }

    fn stake(seed: u8, amount: u64) -> Stake {
        let pair = KeyPair::from_seed([seed; 32]);
        Stake {
            validator_address: pair.address(),
            stake_address: Address::new([seed; 20]),
            pubkey: pair.public_key(),
            ecdsa_pubkey: EcdsaPubKey::default(),
            name: format!("node-{}", seed),
            amount: Amount::from_u64(amount),
        }
    }

    #[test]
    fn stake_accumulates_power() {
        let store = store();
        let first = stake(1, 10);
        let address = first.validator_address.clone();
        store.handle_stake(first).unwrap();
        store.handle_stake(stake(1, 5)).unwrap();

        let validator = store.get(&address).unwrap().unwrap();
        assert_eq!(validator.power, 15);
        assert_eq!(store.total_power().unwrap(), 15);
    }

    #[test]
    fn unstake_to_zero_emits_removal() {
        let store = store();
        let first = stake(1, 10);
        let address = first.validator_address.clone();
        store.handle_stake(first).unwrap();

        // first report: one addition
        let updates = store.get_end_block_update().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].power, 10);

        store
            .handle_unstake(Unstake {
                address: address.clone(),
                amount: Amount::from_u64(10),
            })
            .unwrap();
        let updates = store.get_end_block_update().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].power, 0);
        assert!(store.get(&address).unwrap().is_none());

        // steady state: no more updates
        assert!(store.get_end_block_update().unwrap().is_empty());
    }

    #[test]
    fn byzantine_validator_is_slashed() {
        let store = store();
        let first = stake(1, 10);
        let address = first.validator_address.clone();
        store.handle_stake(first).unwrap();
        store.get_end_block_update().unwrap();

        store.set_begin_block(&[], &[address.clone()]).unwrap();
        let validator = store.get(&address).unwrap().unwrap();
        assert_eq!(validator.power, 0);
        assert_eq!(validator.staked, Amount::zero());

        let updates = store.get_end_block_update().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].power, 0);
    }

    #[test]
    fn unstake_more_than_staked_fails() {
        let store = store();
        let first = stake(1, 10);
        let address = first.validator_address.clone();
        store.handle_stake(first).unwrap();

        let err = store
            .handle_unstake(Unstake {
                address,
                amount: Amount::from_u64(11),
            })
            .unwrap_err();
        assert!(matches!(err, ChainError::UnstakeTooLarge));
    }
}
