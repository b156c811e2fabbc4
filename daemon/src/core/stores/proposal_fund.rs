use super::{delete_key, get_json, iterate_prefix, set_json, KEY_SEPARATOR};
use crate::core::{
    error::ChainError,
    storage::{prefixes, SharedState},
};
use olt_common::{crypto::Address, currency::Amount, governance::ProposalId};

// Mapping (proposal id, funder address) -> deposited amount
// Deposit-only while the proposal is in the Funding stage; refunded in
// full when the proposal fails
#[derive(Clone)]
pub struct ProposalFundStore {
    state: SharedState,
}

impl ProposalFundStore {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    fn id_prefix(id: &ProposalId) -> Vec<u8> {
        let mut key = [prefixes::PROPOSAL_FUND, id.as_str().as_bytes()].concat();
        key.push(KEY_SEPARATOR);
        key
    }

    fn key(id: &ProposalId, funder: &Address) -> Vec<u8> {
        let mut key = Self::id_prefix(id);
        key.extend_from_slice(funder.as_ref());
        key
    }

    pub fn get(&self, id: &ProposalId, funder: &Address) -> Result<Amount, ChainError> {
        Ok(get_json(&self.state, &Self::key(id, funder))?.unwrap_or_default())
    }

    pub fn add_funds(
        &self,
        id: &ProposalId,
        funder: &Address,
        amount: &Amount,
    ) -> Result<(), ChainError> {
        let current = self.get(id, funder)?;
        let updated = current
            .checked_add(amount)
            .ok_or(ChainError::FundUnableToAdd)?;
        set_json(&self.state, Self::key(id, funder), &updated)
    }

    // Total funds deposited towards a proposal
    pub fn get_current_funds(&self, id: &ProposalId) -> Result<Amount, ChainError> {
        let mut total = Amount::zero();
        for (_, amount) in self.get_funders(id)? {
            total = total
                .checked_add(&amount)
                .ok_or(ChainError::FundUnableToAdd)?;
        }
        Ok(total)
    }

    // All funders of a proposal with their deposits, in address order
    pub fn get_funders(&self, id: &ProposalId) -> Result<Vec<(Address, Amount)>, ChainError> {
        let prefix = Self::id_prefix(id);
        let mut funders = Vec::new();
        for (key, value) in iterate_prefix(&self.state, &prefix)? {
            let funder = Address::from_bytes(&key[prefix.len()..])?;
            let amount: Amount =
                serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            funders.push((funder, amount));
        }
        Ok(funders)
    }

    // Remove every fund record of a proposal, after refund or payout
    pub fn delete_funds(&self, id: &ProposalId) -> Result<(), ChainError> {
        for (funder, _) in self.get_funders(id)? {
            delete_key(&self.state, Self::key(id, &funder));
        }
        Ok(())
    }
}
