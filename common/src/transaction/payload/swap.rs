use super::Payload;
use crate::{
    crypto::{Address, Hash},
    currency::{Coin, CurrencySet},
    swap::{HtlcContract, Party, SwapEntity, SwapStage},
    transaction::TxType,
};
use serde::{Deserialize, Serialize};

/// One side's request to swap `amount` for `exchange` with a counter-party.
/// Two opposite requests with the same chain id and nonce match into one
/// swap.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SwapInitPayload {
    /// Chain this request was built for; must equal the block header's.
    #[serde(default)]
    pub chain_id: String,
    pub party: Party,
    pub counter_party: Party,
    /// What this party gives.
    pub amount: Coin,
    /// What this party expects in return.
    pub exchange: Coin,
    pub fee: Coin,
    pub nonce: u64,
}

impl Payload for SwapInitPayload {
    const TX_TYPE: TxType = TxType::Swap;

    fn signers(&self) -> Vec<Address> {
        vec![self.party.key.clone()]
    }
}

// Two swap requests from opposite parties match if and only if they name
// the same chain and nonce, the party keys mirror each other and the
// offered amounts mirror each other
pub fn is_match(left: &SwapInitPayload, right: &SwapInitPayload) -> bool {
    if left.chain_id != right.chain_id {
        return false;
    }
    if left.party.key != right.counter_party.key {
        return false;
    }
    if left.counter_party.key != right.party.key {
        return false;
    }
    if left.amount != right.exchange {
        return false;
    }
    if left.exchange != right.amount {
        return false;
    }
    if left.nonce != right.nonce {
        return false;
    }
    true
}

// Fold two matched requests into the canonical swap entity
// The side offering the lower currency id becomes the initiator and is
// stored as the party, so every replica produces identical bytes
pub fn match_swaps(
    left: &SwapInitPayload,
    right: &SwapInitPayload,
    currencies: &CurrencySet,
) -> Option<SwapEntity> {
    if !is_match(left, right) {
        return None;
    }

    let left_gives = currencies.get_currency_by_name(&left.amount.currency)?;
    let left_wants = currencies.get_currency_by_name(&left.exchange.currency)?;

    let initiator_side = if left_gives.id < left_wants.id {
        left
    } else {
        right
    };
    let participant_side = if std::ptr::eq(initiator_side, left) {
        right
    } else {
        left
    };

    Some(SwapEntity {
        party: initiator_side.party.clone(),
        counter_party: participant_side.party.clone(),
        amount: initiator_side.amount.clone(),
        exchange: initiator_side.exchange.clone(),
        fee: initiator_side.fee.clone(),
        nonce: initiator_side.nonce,
        stage: SwapStage::InitiatorInitiate,
        secret_hash: None,
        contract_low: None,
        contract_high: None,
    })
}

/// Outcome of an off-chain swap stage, re-entering the pipeline to advance
/// the replicated stage machine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublishPayload {
    pub swap_id: Hash,
    /// The party that executed the stage.
    pub publisher: Address,
    /// The stage whose commands completed.
    pub stage: SwapStage,
    /// HTLC created or observed during the stage, if any.
    pub contract: Option<HtlcContract>,
    /// Secret hash published by the initiator's HTLC.
    pub secret_hash: Option<Hash>,
}

impl Payload for PublishPayload {
    const TX_TYPE: TxType = TxType::Publish;

    fn signers(&self) -> Vec<Address> {
        vec![self.publisher.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{Amount, ChainKind, Currency};
    use indexmap::IndexMap;

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

    fn party(byte: u8) -> Party {
        Party {
            key: Address::new([byte; 20]),
            accounts: IndexMap::new(),
        }
    }

    fn request(from: u8, to: u8, give: (&str, u64), want: (&str, u64)) -> SwapInitPayload {
        SwapInitPayload {
            chain_id: "olt-test".to_string(),
            party: party(from),
            counter_party: party(to),
            amount: Coin::new(give.0, Amount::from_u64(give.1)),
            exchange: Coin::new(want.0, Amount::from_u64(want.1)),
            fee: Coin::new("OLT", Amount::zero()),
            nonce: 1,
        }
    }

    #[test]
    fn opposite_requests_match() {
        let a = request(1, 2, ("BTC", 1), ("ETH", 10));
        let b = request(2, 1, ("ETH", 10), ("BTC", 1));
        assert!(is_match(&a, &b));
        assert!(is_match(&b, &a));
    }

    #[test]
    fn nonce_mismatch_does_not_match() {
        let a = request(1, 2, ("BTC", 1), ("ETH", 10));
        let mut b = request(2, 1, ("ETH", 10), ("BTC", 1));
        b.nonce = 2;
        assert!(!is_match(&a, &b));
    }

    #[test]
    fn chain_id_mismatch_does_not_match() {
        let a = request(1, 2, ("BTC", 1), ("ETH", 10));
        let mut b = request(2, 1, ("ETH", 10), ("BTC", 1));
        b.chain_id = "olt-other".to_string();
        assert!(!is_match(&a, &b));
    }

    #[test]
    fn amount_mismatch_does_not_match() {
        let a = request(1, 2, ("BTC", 1), ("ETH", 10));
        let b = request(2, 1, ("ETH", 9), ("BTC", 1));
        assert!(!is_match(&a, &b));
    }

    #[test]
    fn canonical_form_is_order_independent() {
        let a = request(1, 2, ("BTC", 1), ("ETH", 10));
        let b = request(2, 1, ("ETH", 10), ("BTC", 1));
        let currencies = currencies();

        let left_first = match_swaps(&a, &b, &currencies).unwrap();
        let right_first = match_swaps(&b, &a, &currencies).unwrap();
        assert_eq!(left_first, right_first);

        // BTC has the lower currency id, so the BTC-offering side initiates
        assert_eq!(left_first.party.key, Address::new([1; 20]));
        assert_eq!(left_first.amount.currency, "BTC");
        assert_eq!(left_first.exchange.currency, "ETH");
    }
}
