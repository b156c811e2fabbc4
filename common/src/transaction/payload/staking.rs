use super::Payload;
use crate::{
    crypto::{Address, EcdsaPubKey, PublicKey},
    currency::Coin,
    transaction::TxType,
};
use serde::{Deserialize, Serialize};

/// Stake VT behind a validator, or purge (unstake) an existing one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplyValidatorPayload {
    /// Account the stake is debited from.
    pub stake_address: Address,
    /// Stake in VT; also the validator's voting power.
    pub stake: Coin,
    pub node_name: String,
    pub validator_address: Address,
    /// Consensus (Ed25519) public key reported to the driver.
    pub validator_pubkey: PublicKey,
    /// External chain signing key, carried opaque.
    #[serde(default)]
    pub validator_ecdsa_pubkey: EcdsaPubKey,
    /// True to unstake instead of stake.
    #[serde(default)]
    pub purge: bool,
}

impl Payload for ApplyValidatorPayload {
    const TX_TYPE: TxType = TxType::ApplyValidator;

    fn signers(&self) -> Vec<Address> {
        vec![self.stake_address.clone()]
    }
}
