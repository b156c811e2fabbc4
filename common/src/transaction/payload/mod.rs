mod eth;
mod governance;
mod send;
mod staking;
mod swap;

pub use eth::{LockPayload, ReportFinalityPayload};
pub use governance::{ProposalCreatePayload, ProposalFundPayload, ProposalVotePayload};
pub use send::SendPayload;
pub use staking::ApplyValidatorPayload;
pub use swap::{match_swaps, PublishPayload, SwapInitPayload};

use super::TxType;
use crate::crypto::Address;
use serde::{de::DeserializeOwned, Serialize};

// Implemented by every transaction payload
// Signers are the addresses whose signatures must cover the envelope
pub trait Payload: Serialize + DeserializeOwned {
    const TX_TYPE: TxType;

    fn signers(&self) -> Vec<Address>;
}
