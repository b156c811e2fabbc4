use super::{Context, Handler, Response};
use crate::core::{
    driver::Tag,
    stores::{Stake, Unstake},
};
use olt_common::{
    config::STAKE_CURRENCY,
    currency::Coin,
    transaction::{
        payload::{ApplyValidatorPayload, Payload},
        verify::{self, VerificationError},
        RawTx, SignedTx,
    },
};

pub struct ApplyValidatorHandler;

impl Handler for ApplyValidatorHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let apply: ApplyValidatorPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &apply.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if apply.node_name.is_empty() {
            return Err(VerificationError::MissingData("node_name"));
        }
        // stake must be in VT, and the stake is the power
        if apply.stake.currency != STAKE_CURRENCY {
            return Err(VerificationError::InvalidAmount(apply.stake.to_string()));
        }
        if apply.stake.value.is_zero() {
            return Err(VerificationError::InvalidAmount(apply.stake.to_string()));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_apply(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_apply(ctx, tx)
    }
}

fn run_apply(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let apply: ApplyValidatorPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    let stake_coin = Coin::new(STAKE_CURRENCY, apply.stake.value);
    let result = if !apply.purge {
        // staking locks VT out of the staker's balance
        if let Err(err) = ctx.balances.minus_from_address(&apply.stake_address, &stake_coin) {
            return (false, Response::failed(err));
        }
        ctx.validators.handle_stake(Stake {
            validator_address: apply.validator_address.clone(),
            stake_address: apply.stake_address.clone(),
            pubkey: apply.validator_pubkey.clone(),
            ecdsa_pubkey: apply.validator_ecdsa_pubkey.clone(),
            name: apply.node_name.clone(),
            amount: apply.stake.value,
        })
    } else {
        // unstaking refunds VT; fails if the stake is smaller
        match ctx.validators.handle_unstake(Unstake {
            address: apply.validator_address.clone(),
            amount: apply.stake.value,
        }) {
            Ok(()) => ctx
                .balances
                .add_to_address(&apply.stake_address, &stake_coin),
            Err(err) => Err(err),
        }
    };

    if let Err(err) = result {
        return (false, Response::failed(err));
    }

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &apply.stake_address),
    ];
    (true, Response::with_tags(tags))
}
