use crate::core::{action::Context, error::ChainError};
use log::{info, warn};
use olt_common::{
    config::NATIVE_CURRENCY,
    currency::Coin,
    governance::{Proposal, ProposalState, ProposalStatus},
};

// EndBlock enactment: expire unfunded proposals and tally voted ones.
// Runs on the deliver state, so its writes land in the block's commit.
pub fn enact_proposals(ctx: &Context) -> Result<(), ChainError> {
    let height = ctx.header.height;
    let active = ctx.proposals.iterate(ProposalState::Active)?;

    for proposal in active {
        match proposal.status {
            ProposalStatus::Funding if height > proposal.funding_deadline => {
                fail_proposal(ctx, proposal, "funding deadline passed")?;
            }
            ProposalStatus::Voting if height >= proposal.voting_deadline => {
                tally_proposal(ctx, proposal)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn tally_proposal(ctx: &Context, mut proposal: Proposal) -> Result<(), ChainError> {
    let options = ctx.governance_options.get(proposal.proposal_type);
    let passed = ctx
        .proposal_votes
        .is_passed(&proposal.proposal_id, options.pass_percent)?;

    if passed {
        info!("proposal {} passed", proposal.proposal_id);
        // enacted funds become protocol funds
        let total = ctx
            .proposal_funds
            .get_current_funds(&proposal.proposal_id)?;
        if !total.is_zero() {
            ctx.fee_pool
                .add_to_pool(&Coin::new(NATIVE_CURRENCY, total))?;
        }
        ctx.proposal_funds.delete_funds(&proposal.proposal_id)?;
        ctx.proposal_votes.delete(&proposal.proposal_id)?;

        proposal.status = ProposalStatus::Passed;
        ctx.proposals
            .transition(ProposalState::Active, ProposalState::Passed, &proposal)?;
    } else {
        fail_proposal(ctx, proposal, "vote did not pass")?;
    }
    Ok(())
}

// Refund every funder and move the proposal into the failed prefix
fn fail_proposal(ctx: &Context, mut proposal: Proposal, reason: &str) -> Result<(), ChainError> {
    warn!("proposal {} failed: {}", proposal.proposal_id, reason);

    for (funder, amount) in ctx.proposal_funds.get_funders(&proposal.proposal_id)? {
        ctx.balances
            .add_to_address(&funder, &Coin::new(NATIVE_CURRENCY, amount))?;
    }
    ctx.proposal_funds.delete_funds(&proposal.proposal_id)?;
    ctx.proposal_votes.delete(&proposal.proposal_id)?;

    proposal.status = ProposalStatus::Failed;
    ctx.proposals
        .transition(ProposalState::Active, ProposalState::Failed, &proposal)?;
    Ok(())
}
