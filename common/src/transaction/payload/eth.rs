use super::Payload;
use crate::{
    crypto::{Address, Hash},
    currency::ChainKind,
    transaction::TxType,
};
use serde::{Deserialize, Serialize};

/// A user's intent to lock external chain funds into the bridge.
/// Carries the raw signed Ethereum transaction; a background job
/// broadcasts it, never the deliver path.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LockPayload {
    pub locker: Address,
    /// Tracker name, the hash of the raw external transaction.
    pub tracker_name: Hash,
    #[serde(with = "hex::serde")]
    pub eth_txn: Vec<u8>,
}

impl Payload for LockPayload {
    const TX_TYPE: TxType = TxType::EthLock;

    fn signers(&self) -> Vec<Address> {
        vec![self.locker.clone()]
    }
}

/// A validator's attestation that the external chain event behind a
/// tracker has (or has not) finalized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReportFinalityPayload {
    pub validator: Address,
    pub tracker_name: Hash,
    pub chain: ChainKind,
    /// False reports the external transaction as failed.
    pub success: bool,
}

impl Payload for ReportFinalityPayload {
    const TX_TYPE: TxType = TxType::ReportFinality;

    fn signers(&self) -> Vec<Address> {
        vec![self.validator.clone()]
    }
}
