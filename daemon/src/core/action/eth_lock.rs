use super::{Context, Handler, Response};
use crate::core::{driver::Tag, jobs::Job, stores::TrackerStore};
use log::debug;
use olt_common::{
    crypto::hash,
    currency::ChainKind,
    tracker::Tracker,
    transaction::{
        payload::{LockPayload, Payload, ReportFinalityPayload},
        verify::{self, VerificationError},
        RawTx, SignedTx,
    },
};

// ===== EthLock =====

pub struct EthLockHandler;

impl Handler for EthLockHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let lock: LockPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &lock.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if lock.eth_txn.is_empty() {
            return Err(VerificationError::MissingData("eth_txn"));
        }
        // the tracker name commits to the raw transaction bytes
        if hash(&lock.eth_txn) != lock.tracker_name {
            return Err(VerificationError::MissingData("tracker_name"));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_lock(ctx, tx, false)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_lock(ctx, tx, true)
    }
}

// Deliver only records the tracker; a background job broadcasts the raw
// transaction, never the deliver path
fn run_lock(ctx: &Context, tx: &RawTx, deliver: bool) -> (bool, Response) {
    let lock: LockPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    match ctx.eth_trackers.get(&lock.tracker_name) {
        Ok(Some(_)) => return (false, Response::failed("tracker already exists")),
        Ok(None) => {}
        Err(err) => return (false, Response::failed(err)),
    }

    let tracker = Tracker::new(
        lock.tracker_name.clone(),
        ChainKind::Ethereum,
        lock.locker.clone(),
        lock.eth_txn.clone(),
    );
    if let Err(err) = ctx.eth_trackers.set(&tracker) {
        return (false, Response::failed(err));
    }

    if deliver {
        debug!("eth tracker {} created for {}", tracker.name, lock.locker);
        if let Some(jobs) = &ctx.jobs {
            if let Err(err) = jobs.enqueue(&Job::BroadcastTracker {
                chain: ChainKind::Ethereum,
                name: lock.tracker_name.clone(),
            }) {
                return (false, Response::failed(err));
            }
        }
    }

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.locker", &lock.locker),
    ];
    (true, Response::with_tags(tags))
}

// ===== ReportFinality =====

pub struct ReportFinalityHandler;

impl Handler for ReportFinalityHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let report: ReportFinalityPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &report.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if report.chain == ChainKind::Olt {
            return Err(VerificationError::MissingData("chain"));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_report(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_report(ctx, tx)
    }
}

fn run_report(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let report: ReportFinalityPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    // only current validators may witness
    let validator = match ctx.validators.get(&report.validator) {
        Ok(Some(validator)) => validator,
        Ok(None) => return (false, Response::failed("witness is not a validator")),
        Err(err) => return (false, Response::failed(err)),
    };
    if validator.power <= 0 {
        return (false, Response::failed("witness has no power"));
    }

    let store: &TrackerStore = match report.chain {
        ChainKind::Bitcoin => &ctx.btc_trackers,
        ChainKind::Ethereum => &ctx.eth_trackers,
        ChainKind::Olt => return (false, Response::failed("local chain has no trackers")),
    };

    let result = if report.success {
        let total_power = match ctx.validators.total_power() {
            Ok(power) => power,
            Err(err) => return (false, Response::failed(err)),
        };
        let validators = match ctx.validators.get_validator_set() {
            Ok(validators) => validators,
            Err(err) => return (false, Response::failed(err)),
        };
        let power_of = |address: &olt_common::crypto::Address| {
            validators
                .iter()
                .find(|validator| validator.address == *address)
                .map(|validator| validator.power)
                .unwrap_or(0)
        };
        store
            .add_witness(&report.tracker_name, report.validator.clone(), power_of, total_power)
            .map(|state| {
                debug!("tracker {} now {}", report.tracker_name, state);
            })
    } else {
        // a failure report moves the tracker to Failed directly
        match store.get(&report.tracker_name) {
            Ok(Some(mut tracker)) => {
                tracker.state = olt_common::tracker::TrackerState::Failed;
                store.set(&tracker)
            }
            Ok(None) => Err(crate::core::error::ChainError::TrackerNotFound(
                report.tracker_name.clone(),
            )),
            Err(err) => Err(err),
        }
    };

    if let Err(err) = result {
        return (false, Response::failed(err));
    }

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &report.validator),
    ];
    (true, Response::with_tags(tags))
}
