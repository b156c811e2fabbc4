use super::Payload;
use crate::{crypto::Address, currency::Coin, transaction::TxType};
use serde::{Deserialize, Serialize};

/// Plain balance transfer between two local accounts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SendPayload {
    pub from: Address,
    pub to: Address,
    pub amount: Coin,
}

impl Payload for SendPayload {
    const TX_TYPE: TxType = TxType::Send;

    fn signers(&self) -> Vec<Address> {
        vec![self.from.clone()]
    }
}
