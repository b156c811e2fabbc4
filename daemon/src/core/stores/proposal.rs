use super::{delete_key, get_json, iterate_prefix, set_json};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::governance::{Proposal, ProposalId, ProposalState};

// Proposals keyed by id under one of three sub-prefixes
// Active holds Funding and Voting proposals; enactment moves a proposal
// into Passed or Failed
#[derive(Clone)]
pub struct ProposalStore {
    state: SharedState,
}

impl ProposalStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn sub_prefix(state: ProposalState) -> &'static [u8] {
        match state {
            ProposalState::Active => b"a/",
            ProposalState::Passed => b"p/",
            ProposalState::Failed => b"f/",
        }
    }

    fn key(state: ProposalState, id: &ProposalId) -> Vec<u8> {
        [
            prefixes::PROPOSAL,
            Self::sub_prefix(state),
            id.as_str().as_bytes(),
        ]
        .concat()
    }

    pub fn get(
        &self,
        state: ProposalState,
        id: &ProposalId,
    ) -> Result<Option<Proposal>, ChainError> {
        get_json(&self.state, &Self::key(state, id))
    }

    pub fn set(&self, state: ProposalState, proposal: &Proposal) -> Result<(), ChainError> {
        set_json(
            &self.state,
            Self::key(state, &proposal.proposal_id),
            proposal,
        )
    }

    pub fn delete(&self, state: ProposalState, id: &ProposalId) {
        delete_key(&self.state, Self::key(state, id));
    }

    // Move a proposal between prefixes in a single overlay write set
    pub fn transition(
        &self,
        from: ProposalState,
        to: ProposalState,
        proposal: &Proposal,
    ) -> Result<(), ChainError> {
        self.delete(from, &proposal.proposal_id);
        self.set(to, proposal)
    }

    pub fn iterate(&self, state: ProposalState) -> Result<Vec<Proposal>, ChainError> {
        let prefix = [prefixes::PROPOSAL, Self::sub_prefix(state)].concat();
        let mut proposals = Vec::new();
        for (_, value) in iterate_prefix(&self.state, &prefix)? {
            let proposal = serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            proposals.push(proposal);
        }
        Ok(proposals)
    }
}
