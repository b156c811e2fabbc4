use super::{delete_key, exists_key, get_json, iterate_prefix, set_json, KEY_SEPARATOR};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use log::info;
use olt_common::{
    crypto::Address,
    governance::{ProposalId, ProposalVote, VoteOpinion},
};

// Mapping (proposal id, validator address) -> voting record
// Records are snapshotted at the Funding -> Voting transition; only
// addresses present in the snapshot may vote
#[derive(Clone)]
pub struct ProposalVoteStore {
    state: SharedState,
}

impl ProposalVoteStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn id_prefix(id: &ProposalId) -> Vec<u8> {
        let mut key = [prefixes::PROPOSAL_VOTE, id.as_str().as_bytes()].concat();
        key.push(KEY_SEPARATOR);
        key
    }

    fn key(id: &ProposalId, validator: &Address) -> Vec<u8> {
        let mut key = Self::id_prefix(id);
        key.extend_from_slice(validator.as_ref());
        key
    }

    // Write the snapshot entry of one validator; the opinion always
    // starts as Unknown regardless of what the caller passes
    pub fn setup(&self, id: &ProposalId, mut vote: ProposalVote) -> Result<(), ChainError> {
        vote.opinion = VoteOpinion::Unknown;
        set_json(&self.state, Self::key(id, &vote.validator), &vote)
            .map_err(|_| ChainError::VoteSetupValidatorFailed)?;
        info!("vote setup: proposal= {}, {}", id, vote);
        Ok(())
    }

    // Overwrite a snapshotted validator's opinion, keeping the power
    // recorded at the snapshot
    pub fn update(
        &self,
        id: &ProposalId,
        validator: &Address,
        opinion: VoteOpinion,
    ) -> Result<(), ChainError> {
        let key = Self::key(id, validator);
        let mut vote: ProposalVote = get_json(&self.state, &key)?
            .ok_or(ChainError::VoteUpdateVoteFailed)?;
        vote.opinion = opinion;
        set_json(&self.state, key, &vote).map_err(|_| ChainError::VoteUpdateVoteFailed)?;
        info!("vote update: proposal= {}, {}", id, vote);
        Ok(())
    }

    pub fn exists(&self, id: &ProposalId, validator: &Address) -> Result<bool, ChainError> {
        exists_key(&self.state, &Self::key(id, validator))
    }

    // All voting records of a proposal, in validator address order
    pub fn get_votes(&self, id: &ProposalId) -> Result<Vec<ProposalVote>, ChainError> {
        let prefix = Self::id_prefix(id);
        let mut votes = Vec::new();
        for (_, value) in iterate_prefix(&self.state, &prefix)? {
            let vote = serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            votes.push(vote);
        }
        Ok(votes)
    }

    // Delete all voting records under a proposal
    pub fn delete(&self, id: &ProposalId) -> Result<(), ChainError> {
        for vote in self.get_votes(id)? {
            delete_key(&self.state, Self::key(id, &vote.validator));
        }
        Ok(())
    }

    // Pass determination: GiveUp and Unknown are excluded from the
    // denominator; an empty denominator fails the proposal
    pub fn is_passed(&self, id: &ProposalId, pass_percent: i64) -> Result<bool, ChainError> {
        let votes = self.get_votes(id)?;
        if votes.is_empty() {
            return Err(ChainError::VoteCheckVoteResultFailed);
        }

        let mut positive: i64 = 0;
        let mut negative: i64 = 0;
        for vote in &votes {
            match vote.opinion {
                VoteOpinion::Positive => positive += vote.power,
                VoteOpinion::Negative => negative += vote.power,
                VoteOpinion::Unknown | VoteOpinion::GiveUp => {}
            }
        }

        let effective = positive + negative;
        let passed = effective > 0 && positive * 100 >= pass_percent * effective;
        info!(
            "vote result: proposal= {}, positive= {}, negative= {}, passed= {}",
            id, positive, negative, passed
        );
        Ok(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{ChainState, State};

    const PASS_PERCENT: i64 = 67;

    fn store() -> ProposalVoteStore {
        ProposalVoteStore::new(State::shared(ChainState::in_memory().unwrap()))
    }

    fn id() -> ProposalId {
        ProposalId("id_test_proposal".to_string())
    }

    fn addresses(count: usize) -> Vec<Address> {
        (0..count).map(|i| Address::new([i as u8 + 1; 20])).collect()
    }

    // Snapshot `total` validators, then assign opinions to the first
    // `positive`, the next `negative` and the next `giveup` of them
    fn setup_votes(
        store: &ProposalVoteStore,
        total: usize,
        positive: usize,
        negative: usize,
        giveup: usize,
        power: i64,
    ) -> Vec<Address> {
        let addrs = addresses(total);
        for addr in &addrs {
            store
                .setup(&id(), ProposalVote::new(addr.clone(), VoteOpinion::Positive, power))
                .unwrap();
        }
        let mut cursor = 0;
        for opinion in [
            (positive, VoteOpinion::Positive),
            (negative, VoteOpinion::Negative),
            (giveup, VoteOpinion::GiveUp),
        ] {
            for addr in &addrs[cursor..cursor + opinion.0] {
                store.update(&id(), addr, opinion.1).unwrap();
            }
            cursor += opinion.0;
        }
        addrs
    }

    #[test]
    fn setup_forces_unknown_opinion() {
        let store = store();
        setup_votes(&store, 8, 0, 0, 0, 1);
        let votes = store.get_votes(&id()).unwrap();
        assert_eq!(votes.len(), 8);
        assert!(votes.iter().all(|v| v.opinion == VoteOpinion::Unknown));
    }

    #[test]
    fn update_unknown_validator_fails() {
        let store = store();
        setup_votes(&store, 2, 0, 0, 0, 1);
        let outsider = Address::new([99; 20]);
        let err = store
            .update(&id(), &outsider, VoteOpinion::Positive)
            .unwrap_err();
        assert!(matches!(err, ChainError::VoteUpdateVoteFailed));
    }

    #[test]
    fn passed_with_clear_majority() {
        // 6 of 8 positive at power 2: 12/16 = 75% >= 67%
        let store = store();
        setup_votes(&store, 8, 6, 2, 0, 2);
        assert!(store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn giveup_is_excluded_from_denominator() {
        // 5 positive, 2 negative, 1 give up: 5/7 = 71% >= 67%
        let store = store();
        setup_votes(&store, 8, 5, 2, 1, 2);
        assert!(store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn failed_when_majority_is_short() {
        // 5 positive, 3 negative: 62.5% < 67%
        let store = store();
        setup_votes(&store, 8, 5, 3, 0, 2);
        assert!(!store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn all_abstain_fails() {
        // only give-ups and unknowns: denominator is zero
        let store = store();
        setup_votes(&store, 2, 0, 0, 2, 2);
        assert!(!store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn all_unknown_fails() {
        let store = store();
        setup_votes(&store, 8, 0, 0, 0, 2);
        assert!(!store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn all_negative_fails() {
        let store = store();
        setup_votes(&store, 8, 0, 8, 0, 2);
        assert!(!store.is_passed(&id(), PASS_PERCENT).unwrap());
    }

    #[test]
    fn deleted_proposal_has_no_votes() {
        let store = store();
        setup_votes(&store, 4, 2, 1, 0, 2);
        store.delete(&id()).unwrap();
        assert!(store.get_votes(&id()).unwrap().is_empty());
        assert!(store.is_passed(&id(), PASS_PERCENT).is_err());
    }
}
