pub mod chains;
pub mod executor;

use crate::core::error::ChainError;
use chains::ChainClientError;
use olt_common::{
    crypto::Hash,
    currency::{ChainKind, Coin},
    swap::{HtlcContract, Party, Role, SwapStage},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Currency not implemented for swaps: {0}")]
    NotImplementedCurrency(String),

    #[error("Failed to expand stage {0} into commands")]
    Expand(SwapStage),

    #[error("Swap has not reached stage {0} yet")]
    StageNotReady(SwapStage),

    #[error("Failed to extract the secret")]
    ExtractSecretFailed,

    #[error("Contract audit failed: {0}")]
    AuditFailed(String),

    #[error("Secret does not match the secret hash")]
    SecretMismatch,

    #[error("No contract recorded for this stage")]
    MissingContract,

    #[error("Node is not a party of this swap")]
    NotAParty,

    #[error("Swap not found: {0}")]
    SwapNotFound(Hash),

    #[error("No client configured for chain {0}")]
    ChainNotConfigured(ChainKind),

    #[error("Chain client error: {0}")]
    Client(#[from] ChainClientError),

    #[error("Store error: {0}")]
    Store(#[from] ChainError),
}

// The operations a stage can bind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Initiate,
    AuditContract,
    Participate,
    Redeem,
    ExtractSecret,
    Refund,
}

// One step of a stage: an operation against one chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub op: Op,
    pub chain: ChainKind,
}

// Typed context threaded from one command into the next
// Prefers a struct with optional fields over a dynamic map so each opfunc
// states what it consumes and produces
#[derive(Clone, Debug)]
pub struct CommandBag {
    pub my_account: Party,
    pub them_account: Party,
    pub amount: Coin,
    pub exchange: Coin,
    pub role: Role,
    pub nonce: u64,
    pub secret: Option<[u8; 32]>,
    pub secret_hash: Option<Hash>,
    // The contract the current command operates on or has produced
    pub contract: Option<HtlcContract>,
}

// The fixed command sequence of a stage, bound to concrete chains
// `low` is the chain of the lower currency id (the initiator's lock),
// `high` the mirror chain
pub fn expand_stage(
    stage: SwapStage,
    role: Role,
    low: ChainKind,
    high: ChainKind,
) -> Result<Vec<Command>, SwapError> {
    let commands = match (stage, role) {
        (SwapStage::InitiatorInitiate, Role::Initiator) => {
            vec![Command {
                op: Op::Initiate,
                chain: low,
            }]
        }
        (SwapStage::ParticipantParticipate, Role::Participant) => vec![
            Command {
                op: Op::AuditContract,
                chain: low,
            },
            Command {
                op: Op::Participate,
                chain: high,
            },
        ],
        (SwapStage::InitiatorRedeem, Role::Initiator) => vec![
            Command {
                op: Op::AuditContract,
                chain: high,
            },
            Command {
                op: Op::Redeem,
                chain: high,
            },
        ],
        (SwapStage::ParticipantRedeem, Role::Participant) => vec![
            Command {
                op: Op::ExtractSecret,
                chain: high,
            },
            Command {
                op: Op::Redeem,
                chain: low,
            },
        ],
        // each side refunds its own outstanding lock
        (SwapStage::Refund, Role::Initiator) => vec![Command {
            op: Op::Refund,
            chain: low,
        }],
        (SwapStage::Refund, Role::Participant) => vec![Command {
            op: Op::Refund,
            chain: high,
        }],
        _ => return Err(SwapError::Expand(stage)),
    };
    Ok(commands)
}
