use super::{Context, Handler, Response};
use crate::core::{driver::Tag, jobs::Job};
use log::{debug, info};
use olt_common::{
    config::NATIVE_CURRENCY,
    currency::ChainKind,
    swap::{Role, SwapEntity, SwapStage},
    transaction::{
        payload::{match_swaps, Payload, PublishPayload, SwapInitPayload},
        verify::{self, VerificationError},
        RawTx, SignedTx,
    },
};

// Currencies the swap coordinator can settle today
const SWAPPABLE: [&str; 3] = ["BTC", "ETH", NATIVE_CURRENCY];

// Which contract slot of the swap entity a publish at a given stage must
// fill: the initiate stage publishes the low-chain HTLC, the participate
// stage the high-chain mirror, the rest publish no new contract
pub fn expected_contract_field(stage: SwapStage) -> Option<ChainSide> {
    match stage {
        SwapStage::InitiatorInitiate => Some(ChainSide::Low),
        SwapStage::ParticipantParticipate => Some(ChainSide::High),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainSide {
    Low,
    High,
}

// ===== Swap (matching) =====

pub struct SwapHandler;

impl Handler for SwapHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let swap: SwapInitPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &swap.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        // a request built for another network never enters matching
        if swap.chain_id != ctx.header.chain_id {
            return Err(VerificationError::InvalidChainId {
                expected: ctx.header.chain_id.clone(),
                got: swap.chain_id.clone(),
            });
        }
        if swap.party.key == swap.counter_party.key {
            return Err(VerificationError::MissingData("counter_party"));
        }
        for coin in [&swap.amount, &swap.exchange] {
            if !coin.is_currency(&SWAPPABLE) || !ctx.currencies.contains(&coin.currency) {
                return Err(VerificationError::NotImplementedCurrency(
                    coin.currency.clone(),
                ));
            }
            if coin.value.is_zero() {
                return Err(VerificationError::InvalidAmount(coin.to_string()));
            }
        }
        if swap.amount.currency == swap.exchange.currency {
            return Err(VerificationError::InvalidAmount(swap.exchange.to_string()));
        }

        // each side must have an address on every external chain involved
        for coin in [&swap.amount, &swap.exchange] {
            let chain = ctx
                .currencies
                .get_currency_by_name(&coin.currency)
                .map(|currency| currency.chain)
                .unwrap_or(ChainKind::Olt);
            if chain == ChainKind::Olt {
                continue;
            }
            for party in [&swap.party, &swap.counter_party] {
                if party.account_on(chain).is_none() {
                    return Err(VerificationError::MissingData("chain account"));
                }
            }
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_swap_init(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_swap_init(ctx, tx)
    }
}

// Matching is fully deterministic: the first request of a pair is parked
// under (counter-party, nonce); the mirror request finds it there and
// folds both into the canonical entity
fn run_swap_init(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let request: SwapInitPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &request.party.key),
        Tag::new("tx.swapNonce", request.nonce),
    ];

    // a mirror request would have been parked under our own key
    let parked = match ctx.swaps.get_unmatched(&request.party.key, request.nonce) {
        Ok(parked) => parked,
        Err(err) => return (false, Response::failed(err)),
    };

    if let Some(entry) = parked {
        if let Some(swap) = match_swaps(&entry, &request, &ctx.currencies) {
            ctx.swaps.delete_unmatched(&request.party.key, request.nonce);
            if let Err(err) = ctx.swaps.set(&swap) {
                return (false, Response::failed(err));
            }
            info!(
                "swap {} matched: {} for {}",
                swap.id(),
                swap.amount,
                swap.exchange
            );
            schedule_stage_job(ctx, &swap, SwapStage::InitiatorInitiate);
            return (true, Response::with_tags(tags));
        }
        // same key and nonce but different terms: leave the parked entry
        return (false, Response::failed("swap request does not match"));
    }

    if let Err(err) = ctx.swaps.save_unmatched(&request) {
        return (false, Response::failed(err));
    }
    debug!(
        "swap request from {} parked, waiting for counter-party",
        request.party.key
    );
    (true, Response::with_tags(tags))
}

// ===== Publish (stage advancement) =====

pub struct PublishHandler;

impl Handler for PublishHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let publish: PublishPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &publish.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if expected_contract_field(publish.stage).is_some() && publish.contract.is_none() {
            return Err(VerificationError::MissingData("contract"));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_publish(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_publish(ctx, tx)
    }
}

fn run_publish(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let publish: PublishPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &publish.publisher),
        Tag::new("tx.swapID", &publish.swap_id),
    ];

    let mut swap = match ctx.swaps.get(&publish.swap_id) {
        Ok(Some(swap)) => swap,
        Ok(None) => {
            return (
                false,
                Response::failed(crate::core::error::ChainError::SwapNotFound(
                    publish.swap_id.clone(),
                )),
            )
        }
        Err(err) => return (false, Response::failed(err)),
    };

    // the publisher must be the party responsible for the stage
    let Some(role) = swap.role_of(&publish.publisher) else {
        return (
            false,
            Response::failed(crate::core::error::ChainError::NotSwapParty),
        );
    };
    if publish.stage != SwapStage::Refund {
        match Role::for_stage(publish.stage) {
            Some(expected) if expected == role => {}
            _ => return (false, Response::failed("publisher role does not own this stage")),
        }
    }

    if publish.stage == SwapStage::Refund {
        // the refund branch is orthogonal: reachable from any stage
        // after the lock timeout, but not once the swap has finished
        match swap.stage {
            SwapStage::Refund => return (true, Response::with_tags(tags)),
            SwapStage::Finish => {
                return (false, Response::failed("swap already finished"));
            }
            _ => swap.stage = SwapStage::Refund,
        }
    } else if swap.stage != publish.stage {
        // re-delivery of an already applied publish is a no-op
        if stage_already_applied(&swap, publish.stage) {
            return (true, Response::with_tags(tags));
        }
        return (
            false,
            Response::failed(crate::core::error::ChainError::SwapStageMismatch {
                expected: swap.stage.to_string(),
                got: publish.stage.to_string(),
            }),
        );
    } else {
        // record the published contract where the stage expects it
        match expected_contract_field(publish.stage) {
            Some(ChainSide::Low) => {
                swap.contract_low = publish.contract.clone();
                swap.secret_hash = publish.secret_hash.clone();
            }
            Some(ChainSide::High) => {
                swap.contract_high = publish.contract.clone();
            }
            None => {}
        }
        if let Some(contract) = &publish.contract {
            // both parties audit against the replicated contract record,
            // keyed by the publisher's counter-party
            let them = if role == Role::Initiator {
                swap.counter_party.key.clone()
            } else {
                swap.party.key.clone()
            };
            if let Err(err) = ctx.contracts.set(&them, swap.nonce, contract) {
                return (false, Response::failed(err));
            }
            if let Err(err) = track_broadcast(ctx, &publish.publisher, contract) {
                return (false, Response::failed(err));
            }
        }

        let Some(next) = publish.stage.out_stage() else {
            return (false, Response::failed("stage cannot advance"));
        };
        swap.stage = next;
    }

    if let Err(err) = ctx.swaps.set(&swap) {
        return (false, Response::failed(err));
    }
    info!("swap {} advanced to {}", publish.swap_id, swap.stage);

    if swap.stage == SwapStage::Finish {
        finalize_swap(ctx, &swap);
    } else if swap.stage != SwapStage::Refund {
        schedule_stage_job(ctx, &swap, swap.stage);
    }

    (true, Response::with_tags(tags))
}

// Record the published lock transaction as a tracker on its chain, so
// witnesses can attest to its finality like any other external lock
fn track_broadcast(
    ctx: &Context,
    publisher: &olt_common::crypto::Address,
    contract: &olt_common::swap::HtlcContract,
) -> Result<(), crate::core::error::ChainError> {
    let store = match contract.chain {
        ChainKind::Bitcoin => &ctx.btc_trackers,
        ChainKind::Ethereum => &ctx.eth_trackers,
        ChainKind::Olt => return Ok(()),
    };
    let name = olt_common::crypto::hash(&contract.raw_tx);
    if store.get(&name)?.is_none() {
        store.set(&olt_common::tracker::Tracker::new(
            name,
            contract.chain,
            publisher.clone(),
            contract.raw_tx.clone(),
        ))?;
    }
    Ok(())
}

// A publish for an earlier stage that the entity has already moved past
fn stage_already_applied(swap: &SwapEntity, stage: SwapStage) -> bool {
    let mut cursor = stage;
    while let Some(next) = cursor.out_stage() {
        if next == swap.stage {
            return true;
        }
        cursor = next;
    }
    swap.stage == SwapStage::Finish || swap.stage == SwapStage::Refund
}

// Deterministic cleanup once both redeems have happened
fn finalize_swap(ctx: &Context, swap: &SwapEntity) {
    ctx.contracts.delete(&swap.party.key, swap.nonce);
    ctx.contracts.delete(&swap.counter_party.key, swap.nonce);
    info!("swap {} finished", swap.id());
}

// Queue the off-chain work for the next stage if this node plays the
// responsible role; other replicas only track the state
fn schedule_stage_job(ctx: &Context, swap: &SwapEntity, stage: SwapStage) {
    let Some(jobs) = &ctx.jobs else {
        return;
    };
    let Some(node) = &ctx.node_account else {
        return;
    };
    let Some(role) = Role::for_stage(stage) else {
        return;
    };
    let responsible = match role {
        Role::Initiator => &swap.party.key,
        Role::Participant => &swap.counter_party.key,
    };
    if responsible == node {
        if let Err(err) = jobs.enqueue(&Job::SwapStage {
            swap_id: swap.id(),
            stage,
        }) {
            log::error!("failed to enqueue swap stage job: {}", err);
        }
    }
}
