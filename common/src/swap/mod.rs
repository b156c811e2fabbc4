use crate::{
    crypto::{hash, Address, Hash},
    currency::{ChainKind, Coin, CurrencySet},
    serializer::{Serializer, Writer},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// Stage of the cross-chain swap state machine
// The refund branch is orthogonal and reachable from any stage once the
// HTLC timeout has passed
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum SwapStage {
    Matching,
    WaitForChain,
    InitiatorInitiate,
    ParticipantParticipate,
    InitiatorRedeem,
    ParticipantRedeem,
    Finish,
    Refund,
}

impl SwapStage {
    // The stage entered once this stage's commands have all succeeded
    pub fn out_stage(&self) -> Option<SwapStage> {
        match self {
            SwapStage::Matching => Some(SwapStage::InitiatorInitiate),
            SwapStage::WaitForChain => Some(SwapStage::InitiatorInitiate),
            SwapStage::InitiatorInitiate => Some(SwapStage::ParticipantParticipate),
            SwapStage::ParticipantParticipate => Some(SwapStage::InitiatorRedeem),
            SwapStage::InitiatorRedeem => Some(SwapStage::ParticipantRedeem),
            SwapStage::ParticipantRedeem => Some(SwapStage::Finish),
            SwapStage::Finish | SwapStage::Refund => None,
        }
    }
}

// Which side of a matched swap this node plays
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Participant,
}

impl Role {
    // The party responsible for executing the commands of a stage
    pub fn for_stage(stage: SwapStage) -> Option<Role> {
        match stage {
            SwapStage::InitiatorInitiate | SwapStage::InitiatorRedeem => Some(Role::Initiator),
            SwapStage::ParticipantParticipate | SwapStage::ParticipantRedeem => {
                Some(Role::Participant)
            }
            _ => None,
        }
    }
}

// An account address on an external chain, carried as opaque bytes
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainAddress(#[serde(with = "hex::serde")] pub Vec<u8>);

// One side of a swap: the local account plus its addresses on the
// external chains it trades over
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Party {
    pub key: Address,
    #[serde(default)]
    pub accounts: IndexMap<ChainKind, ChainAddress>,
}

impl Party {
    pub fn account_on(&self, chain: ChainKind) -> Option<&ChainAddress> {
        self.accounts.get(&chain)
    }
}

// Replicated record of a published HTLC on an external chain
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HtlcContract {
    pub chain: ChainKind,
    // Contract address (ETH) or redeem script hash (BTC)
    #[serde(with = "hex::serde")]
    pub address: Vec<u8>,
    // Raw contract transaction as broadcast
    #[serde(with = "hex::serde")]
    pub raw_tx: Vec<u8>,
    pub secret_hash: Hash,
    #[serde(with = "hex::serde")]
    pub receiver: Vec<u8>,
    pub value: crate::currency::Amount,
    // Unix timestamp after which the contract refunds to its creator
    pub timeout: u64,
}

// A matched swap in its canonical form
// Party is always the initiator side, so every replica stores the exact
// same bytes for the same pair of requests
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SwapEntity {
    pub party: Party,
    pub counter_party: Party,
    pub amount: Coin,
    pub exchange: Coin,
    pub fee: Coin,
    pub nonce: u64,
    pub stage: SwapStage,
    pub secret_hash: Option<Hash>,
    // HTLC on the lower-currency-id chain, created by the initiator
    pub contract_low: Option<HtlcContract>,
    // Mirror HTLC on the other chain, created by the participant
    pub contract_high: Option<HtlcContract>,
}

impl SwapEntity {
    // Stable identifier of a matched swap
    pub fn id(&self) -> Hash {
        swap_id(&self.party.key, &self.counter_party.key, self.nonce)
    }

    // Chain ordering for command execution: the local chain first, then
    // the chain of the lower currency id, then the higher
    pub fn chains(&self, currencies: &CurrencySet) -> Option<[ChainKind; 3]> {
        let low = currencies.get_currency_by_name(&self.amount.currency)?;
        let high = currencies.get_currency_by_name(&self.exchange.currency)?;
        Some([ChainKind::Olt, low.chain, high.chain])
    }

    // The chain the initiator locks funds on
    pub fn low_chain(&self, currencies: &CurrencySet) -> Option<ChainKind> {
        self.chains(currencies).map(|chains| chains[1])
    }

    // The chain the participant locks funds on
    pub fn high_chain(&self, currencies: &CurrencySet) -> Option<ChainKind> {
        self.chains(currencies).map(|chains| chains[2])
    }

    pub fn role_of(&self, account: &Address) -> Option<Role> {
        if self.party.key == *account {
            Some(Role::Initiator)
        } else if self.counter_party.key == *account {
            Some(Role::Participant)
        } else {
            None
        }
    }
}

// Id both parties derive for the same matched swap: the initiator key is
// always hashed first because the entity is canonicalized before this
pub fn swap_id(party: &Address, counter_party: &Address, nonce: u64) -> Hash {
    let mut buffer = Vec::new();
    let mut writer = Writer::new(&mut buffer);
    party.write(&mut writer);
    counter_party.write(&mut writer);
    writer.write_u64(&nonce);
    hash(&buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{Amount, Currency};

    fn currencies() -> CurrencySet {
        let mut set = CurrencySet::new();
        for (id, name, chain) in [
            (0u32, "OLT", ChainKind::Olt),
            (1, "BTC", ChainKind::Bitcoin),
            (2, "ETH", ChainKind::Ethereum),
        ] {
            set.register(Currency {
                id,
                name: name.to_string(),
                chain,
                decimals: 8,
            });
        }
        set
    }

    fn entity() -> SwapEntity {
        SwapEntity {
            party: Party {
                key: Address::new([1; 20]),
                accounts: IndexMap::new(),
            },
            counter_party: Party {
                key: Address::new([2; 20]),
                accounts: IndexMap::new(),
            },
            amount: Coin::new("BTC", Amount::from_u64(1)),
            exchange: Coin::new("ETH", Amount::from_u64(10)),
            fee: Coin::new("OLT", Amount::zero()),
            nonce: 7,
            stage: SwapStage::InitiatorInitiate,
            secret_hash: None,
            contract_low: None,
            contract_high: None,
        }
    }

    #[test]
    fn chain_order_is_local_low_high() {
        let swap = entity();
        let chains = swap.chains(&currencies()).unwrap();
        assert_eq!(
            chains,
            [ChainKind::Olt, ChainKind::Bitcoin, ChainKind::Ethereum]
        );
    }

    #[test]
    fn swap_id_is_stable() {
        let swap = entity();
        assert_eq!(swap.id(), swap.id());
    }

    #[test]
    fn stage_progression_ends_at_finish() {
        let mut stage = SwapStage::InitiatorInitiate;
        let mut steps = 0;
        while let Some(next) = stage.out_stage() {
            stage = next;
            steps += 1;
        }
        assert_eq!(stage, SwapStage::Finish);
        assert_eq!(steps, 3);
    }
}
