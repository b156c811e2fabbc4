use super::{Context, Handler, Response};
use crate::core::driver::Tag;
use olt_common::transaction::{
    payload::{Payload, SendPayload},
    verify::{self, VerificationError},
    RawTx, SignedTx,
};

pub struct SendHandler;

impl Handler for SendHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let send: SendPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &send.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if !ctx.currencies.contains(&send.amount.currency) {
            return Err(VerificationError::InvalidAmount(send.amount.to_string()));
        }
        if send.amount.value.is_zero() {
            return Err(VerificationError::InvalidAmount(send.amount.to_string()));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_send(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_send(ctx, tx)
    }
}

fn run_send(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let send: SendPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    if let Err(err) = ctx.balances.minus_from_address(&send.from, &send.amount) {
        return (false, Response::failed(err));
    }
    if let Err(err) = ctx.balances.add_to_address(&send.to, &send.amount) {
        return (false, Response::failed(err));
    }

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &send.from),
        Tag::new("tx.to", &send.to),
    ];
    (true, Response::with_tags(tags))
}
