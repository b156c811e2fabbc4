use crate::{
    crypto::{hash, Address},
    currency::Amount,
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Error, Formatter};

// Identifier of a proposal, the hex SHA-256 of (proposer, type, height)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProposalId(pub String);

impl ProposalId {
    pub fn create(proposer: &Address, proposal_type: ProposalType, height: u64) -> Self {
        let mut buffer = Vec::new();
        let mut writer = Writer::new(&mut buffer);
        proposer.write(&mut writer);
        writer.write_u8(proposal_type as u8);
        writer.write_u64(&height);
        ProposalId(hash(&buffer).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProposalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProposalType {
    ConfigUpdate = 0,
    CodeChange = 1,
    General = 2,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Funding,
    Voting,
    Passed,
    Failed,
}

// Storage prefix a proposal currently lives under
// Active holds Funding and Voting proposals; enactment moves them out
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalState {
    Active,
    Passed,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub proposal_id: ProposalId,
    pub proposal_type: ProposalType,
    pub proposer: Address,
    pub description: String,
    pub funding_goal: Amount,
    // Block heights
    pub funding_deadline: u64,
    pub voting_deadline: u64,
    pub status: ProposalStatus,
    pub created_at: u64,
}

// Per-type governance parameters loaded from genesis
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProposalOption {
    pub funding_goal: Amount,
    pub funding_deadline_blocks: u64,
    pub voting_deadline_blocks: u64,
    // Percentage of effective power required to pass, 0..=100
    pub pass_percent: i64,
}

impl Default for ProposalOption {
    fn default() -> Self {
        Self {
            funding_goal: Amount::from_u64(1_000),
            funding_deadline_blocks: 150_000,
            voting_deadline_blocks: 300_000,
            pass_percent: 67,
        }
    }
}

// Voting opinion of a validator on a proposal
// Unknown is the snapshot placeholder before the validator has voted
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum VoteOpinion {
    Unknown,
    Positive,
    Negative,
    GiveUp,
}

impl Serializer for VoteOpinion {
    fn write(&self, writer: &mut Writer) {
        let v = match self {
            VoteOpinion::Unknown => 0u8,
            VoteOpinion::Positive => 1u8,
            VoteOpinion::Negative => 2u8,
            VoteOpinion::GiveUp => 3u8,
        };
        writer.write_u8(v);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(VoteOpinion::Unknown),
            1 => Ok(VoteOpinion::Positive),
            2 => Ok(VoteOpinion::Negative),
            3 => Ok(VoteOpinion::GiveUp),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn size(&self) -> usize {
        1
    }
}

// One validator's voting record on a proposal
// Power is snapshotted when the proposal enters the Voting stage
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalVote {
    pub validator: Address,
    pub opinion: VoteOpinion,
    pub power: i64,
}

impl ProposalVote {
    pub fn new(validator: Address, opinion: VoteOpinion, power: i64) -> Self {
        Self {
            validator,
            opinion,
            power,
        }
    }
}

impl Display for ProposalVote {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "validator= {}, opinion= {}, power= {}",
            self.validator, self.opinion, self.power
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_id_is_deterministic() {
        let proposer = Address::zero();
        let a = ProposalId::create(&proposer, ProposalType::General, 42);
        let b = ProposalId::create(&proposer, ProposalType::General, 42);
        let c = ProposalId::create(&proposer, ProposalType::General, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
