use olt_common::{
    balance::BalanceError,
    crypto::Hash,
    governance::ProposalId,
    serializer::ReaderError,
    transaction::{verify::VerificationError, TxType},
};
use thiserror::Error;

// Error of every store and handler operation in the node core
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("No handler registered for transaction type {0}")]
    HandlerNotFound(TxType),

    #[error("Handler for transaction type {0} registered twice")]
    DuplicateHandler(TxType),

    #[error("Validation failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Not enough funds: {0}")]
    NotEnoughFund(BalanceError),

    // ===== Storage =====
    #[error("Error serializing record: {0}")]
    Serialization(serde_json::Error),

    #[error("Error deserializing record: {0}")]
    Deserialization(serde_json::Error),

    #[error("Error setting record: {0}")]
    SettingRecord(sled::Error),

    #[error("Error getting record: {0}")]
    GettingRecord(sled::Error),

    #[error("Error deleting record: {0}")]
    DeletingRecord(sled::Error),

    #[error("Wire decoding failed: {0}")]
    Reader(#[from] ReaderError),

    // ===== Validators =====
    #[error("Validator not found")]
    ValidatorNotFound,

    #[error("Stake must be in VT, got {0}")]
    WrongStakeCurrency(String),

    #[error("Unstake larger than current stake")]
    UnstakeTooLarge,

    #[error("Error getting validator list")]
    GettingValidatorList,

    // ===== Governance =====
    #[error("Proposal does not exist: {0}")]
    ProposalNotExists(ProposalId),

    #[error("Proposal funding deadline has crossed")]
    FundingDeadlineCrossed,

    #[error("Proposal status is not funding")]
    StatusNotFunding,

    #[error("Failed to set up voting validator")]
    SetupVotingValidator,

    #[error("Unable to set proposal status to voting")]
    StatusUnableToSetVoting,

    #[error("Unable to add funds to proposal")]
    FundUnableToAdd,

    #[error("Failed to set up vote for validator")]
    VoteSetupValidatorFailed,

    #[error("Failed to update vote")]
    VoteUpdateVoteFailed,

    #[error("Failed to check vote result")]
    VoteCheckVoteResultFailed,

    #[error("Voting deadline has crossed")]
    VotingDeadlineCrossed,

    // ===== Trackers =====
    #[error("Tracker not found: {0}")]
    TrackerNotFound(Hash),

    #[error("Tracker is in a final state")]
    TrackerFinalState,

    // ===== Swaps =====
    #[error("Swap not found: {0}")]
    SwapNotFound(Hash),

    #[error("Swap stage mismatch: expected {expected}, got {got}")]
    SwapStageMismatch { expected: String, got: String },

    #[error("Publisher is not a party of the swap")]
    NotSwapParty,
}

impl From<BalanceError> for ChainError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::Insufficient { .. } => ChainError::NotEnoughFund(err),
            BalanceError::Overflow => ChainError::NotEnoughFund(err),
        }
    }
}
