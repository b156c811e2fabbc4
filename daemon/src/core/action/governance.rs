use super::{Context, Handler, Response};
use crate::core::{driver::Tag, error::ChainError};
use log::debug;
use olt_common::{
    config::NATIVE_CURRENCY,
    governance::{Proposal, ProposalId, ProposalState, ProposalStatus, ProposalVote, VoteOpinion},
    transaction::{
        payload::{Payload, ProposalCreatePayload, ProposalFundPayload, ProposalVotePayload},
        verify::{self, VerificationError},
        RawTx, SignedTx,
    },
};

// ===== ProposalCreate =====

pub struct ProposalCreateHandler;

impl Handler for ProposalCreateHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let create: ProposalCreatePayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &create.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        if create.description.is_empty() {
            return Err(VerificationError::MissingData("description"));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_create(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_create(ctx, tx)
    }
}

fn run_create(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let create: ProposalCreatePayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    let options = ctx.governance_options.get(create.proposal_type);
    let funding_goal = if create.funding_goal.is_zero() {
        options.funding_goal
    } else {
        create.funding_goal
    };

    let height = ctx.header.height;
    let proposal = Proposal {
        proposal_id: ProposalId::create(&create.proposer, create.proposal_type, height),
        proposal_type: create.proposal_type,
        proposer: create.proposer.clone(),
        description: create.description.clone(),
        funding_goal,
        funding_deadline: height + options.funding_deadline_blocks,
        voting_deadline: 0,
        status: ProposalStatus::Funding,
        created_at: height,
    };

    // a duplicate id means the same proposer retried within one block
    match ctx
        .proposals
        .get(ProposalState::Active, &proposal.proposal_id)
    {
        Ok(Some(_)) => return (false, Response::failed("proposal already exists")),
        Ok(None) => {}
        Err(err) => return (false, Response::failed(err)),
    }

    if let Err(err) = ctx.proposals.set(ProposalState::Active, &proposal) {
        return (false, Response::failed(err));
    }
    debug!(
        "proposal {} created, funding deadline {}",
        proposal.proposal_id, proposal.funding_deadline
    );

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &create.proposer),
        Tag::new("tx.proposalID", &proposal.proposal_id),
    ];
    (true, Response::with_tags(tags))
}

// ===== ProposalFund =====

pub struct ProposalFundHandler;

impl Handler for ProposalFundHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let fund: ProposalFundPayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &fund.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        // funding currency must be the native one
        let currency = ctx
            .currencies
            .get_currency_by_name(NATIVE_CURRENCY)
            .unwrap_or_else(|| panic!("no default currency available in the network"));
        if currency.name != fund.fund_value.currency {
            return Err(VerificationError::InvalidAmount(fund.fund_value.to_string()));
        }
        if fund.fund_value.value.is_zero() {
            return Err(VerificationError::InvalidAmount(fund.fund_value.to_string()));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_fund(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_fund(ctx, tx)
    }
}

// The whole fund path runs inside the per-transaction overlay: any store
// failure aborts the transaction and the rollback restores the funder's
// balance, so compensation cannot half-apply
fn run_fund(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let fund: ProposalFundPayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };
    let tags = fund_tags(tx, &fund);

    // 1. the proposal must exist in the active prefix
    let mut proposal = match ctx.proposals.get(ProposalState::Active, &fund.proposal_id) {
        Ok(Some(proposal)) => proposal,
        Ok(None) => {
            return (
                false,
                Response {
                    log: ChainError::ProposalNotExists(fund.proposal_id.clone()).to_string(),
                    tags,
                    ..Default::default()
                },
            )
        }
        Err(err) => return (false, Response::failed(err)),
    };

    // 2. funding must happen before the funding deadline
    if ctx.header.height > proposal.funding_deadline {
        return (
            false,
            Response {
                log: ChainError::FundingDeadlineCrossed.to_string(),
                tags,
                ..Default::default()
            },
        );
    }
    // 3. and only while the proposal is in the funding stage
    if proposal.status != ProposalStatus::Funding {
        return (
            false,
            Response {
                log: ChainError::StatusNotFunding.to_string(),
                tags,
                ..Default::default()
            },
        );
    }

    // 4. reaching the funding goal flips the proposal into Voting and
    // snapshots the validator set in the same commit
    let current = match ctx.proposal_funds.get_current_funds(&fund.proposal_id) {
        Ok(amount) => amount,
        Err(err) => return (false, Response::failed(err)),
    };
    let new_total = match current.checked_add(&fund.fund_value.value) {
        Some(total) => total,
        None => return (false, Response::failed("fund amount overflow")),
    };

    if new_total >= proposal.funding_goal {
        let options = ctx.governance_options.get(proposal.proposal_type);
        proposal.status = ProposalStatus::Voting;
        proposal.voting_deadline = ctx.header.height + options.voting_deadline_blocks;

        let validators = match ctx.validators.get_validator_set() {
            Ok(validators) => validators,
            Err(_) => return (false, Response::failed(ChainError::GettingValidatorList)),
        };
        for validator in validators {
            let vote =
                ProposalVote::new(validator.address, VoteOpinion::Unknown, validator.power);
            if ctx.proposal_votes.setup(&fund.proposal_id, vote).is_err() {
                return (false, Response::failed(ChainError::SetupVotingValidator));
            }
        }

        if ctx.proposals.set(ProposalState::Active, &proposal).is_err() {
            return (false, Response::failed(ChainError::StatusUnableToSetVoting));
        }
        debug!(
            "proposal {} funded to goal, voting until {}",
            proposal.proposal_id, proposal.voting_deadline
        );
    }

    // 5. move the funds from the funder's balance into the fund store
    if let Err(err) = ctx
        .balances
        .minus_from_address(&fund.funder_address, &fund.fund_value)
    {
        return (false, Response::failed(err));
    }
    if let Err(err) =
        ctx.proposal_funds
            .add_funds(&fund.proposal_id, &fund.funder_address, &fund.fund_value.value)
    {
        return (false, Response::failed(err));
    }

    (
        true,
        Response {
            tags,
            ..Default::default()
        },
    )
}

fn fund_tags(tx: &RawTx, fund: &ProposalFundPayload) -> Vec<Tag> {
    vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.funder", &fund.funder_address),
        Tag::new("tx.proposalID", &fund.proposal_id),
        Tag::new("tx.FundValue", &fund.fund_value.value),
    ]
}

// ===== ProposalVote =====

pub struct ProposalVoteHandler;

impl Handler for ProposalVoteHandler {
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError> {
        let vote: ProposalVotePayload = tx
            .raw
            .decode_payload()
            .map_err(|_| VerificationError::WrongTxType)?;

        verify::validate_basic(&tx.raw_bytes(), &vote.signers(), &tx.signatures)?;
        verify::validate_fee(&ctx.fee_opt, tx)?;

        // Unknown is the snapshot placeholder, not a castable opinion
        if vote.opinion == VoteOpinion::Unknown {
            return Err(VerificationError::MissingData("opinion"));
        }
        Ok(())
    }

    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_vote(ctx, tx)
    }

    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response) {
        run_vote(ctx, tx)
    }
}

fn run_vote(ctx: &Context, tx: &RawTx) -> (bool, Response) {
    let vote: ProposalVotePayload = match tx.decode_payload() {
        Ok(payload) => payload,
        Err(err) => return (false, Response::failed(err)),
    };

    let proposal = match ctx.proposals.get(ProposalState::Active, &vote.proposal_id) {
        Ok(Some(proposal)) => proposal,
        Ok(None) => {
            return (
                false,
                Response::failed(ChainError::ProposalNotExists(vote.proposal_id.clone())),
            )
        }
        Err(err) => return (false, Response::failed(err)),
    };

    if proposal.status != ProposalStatus::Voting {
        return (false, Response::failed("proposal is not in voting stage"));
    }
    if ctx.header.height > proposal.voting_deadline {
        return (false, Response::failed(ChainError::VotingDeadlineCrossed));
    }

    // only validators in the snapshot may vote; last write wins within
    // the voting window
    if let Err(err) =
        ctx.proposal_votes
            .update(&vote.proposal_id, &vote.validator_address, vote.opinion)
    {
        return (false, Response::failed(err));
    }

    let tags = vec![
        Tag::new("tx.type", tx.tx_type),
        Tag::new("tx.owner", &vote.validator_address),
        Tag::new("tx.proposalID", &vote.proposal_id),
    ];
    (true, Response::with_tags(tags))
}
