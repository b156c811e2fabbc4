use super::Payload;
use crate::{
    crypto::Address,
    currency::{Amount, Coin},
    governance::{ProposalId, ProposalType, VoteOpinion},
    transaction::TxType,
};
use serde::{Deserialize, Serialize};

/// Open a new proposal in the Funding stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalCreatePayload {
    pub proposal_type: ProposalType,
    pub proposer: Address,
    pub description: String,
    /// Zero means the per-type default from the governance options.
    #[serde(default)]
    pub funding_goal: Amount,
}

impl Payload for ProposalCreatePayload {
    const TX_TYPE: TxType = TxType::ProposalCreate;

    fn signers(&self) -> Vec<Address> {
        vec![self.proposer.clone()]
    }
}

/// Deposit OLT towards a proposal's funding goal.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalFundPayload {
    pub proposal_id: ProposalId,
    pub funder_address: Address,
    pub fund_value: Coin,
}

impl Payload for ProposalFundPayload {
    const TX_TYPE: TxType = TxType::ProposalFund;

    fn signers(&self) -> Vec<Address> {
        vec![self.funder_address.clone()]
    }
}

/// A snapshotted validator's vote on a proposal in the Voting stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalVotePayload {
    pub proposal_id: ProposalId,
    pub validator_address: Address,
    pub opinion: VoteOpinion,
}

impl Payload for ProposalVotePayload {
    const TX_TYPE: TxType = TxType::ProposalVote;

    fn signers(&self) -> Vec<Address> {
        vec![self.validator_address.clone()]
    }
}
