mod eth_lock;
mod governance;
mod send;
mod staking;
mod swap;

pub use swap::expected_contract_field;

use crate::core::{
    driver::{Header, Tag},
    error::ChainError,
    jobs::JobStore,
    storage::SharedState,
    stores::{
        BalanceStore, ContractStore, FeePoolStore, ProposalFundStore, ProposalStore,
        ProposalVoteStore, SwapStore, TrackerStore, ValidatorStore,
    },
};
use indexmap::IndexMap;
use log::debug;
use olt_common::{
    crypto::Address,
    currency::CurrencySet,
    fees::FeeOption,
    genesis::GovernanceOptions,
    serializer::Serializer,
    transaction::{verify::VerificationError, RawTx, SignedTx, TxType},
};

// Result surface of ProcessCheck / ProcessDeliver / ProcessFee
#[derive(Clone, Debug, Default)]
pub struct Response {
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub tags: Vec<Tag>,
}

impl Response {
    pub fn failed(log: impl ToString) -> Self {
        Self {
            log: log.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tags(tags: Vec<Tag>) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }
}

// Per-block capability handed to handlers; the only way they reach state
pub struct Context {
    pub header: Header,
    pub balances: BalanceStore,
    pub validators: ValidatorStore,
    pub proposals: ProposalStore,
    pub proposal_funds: ProposalFundStore,
    pub proposal_votes: ProposalVoteStore,
    pub btc_trackers: TrackerStore,
    pub eth_trackers: TrackerStore,
    pub swaps: SwapStore,
    pub contracts: ContractStore,
    pub fee_pool: FeePoolStore,
    pub currencies: CurrencySet,
    pub fee_opt: FeeOption,
    pub governance_options: GovernanceOptions,
    // Account of this node, if it participates in swaps
    pub node_account: Option<Address>,
    // Job queue, present on the deliver path only
    pub jobs: Option<JobStore>,
}

impl Context {
    pub fn new(
        header: Header,
        state: SharedState,
        currencies: CurrencySet,
        fee_opt: FeeOption,
        governance_options: GovernanceOptions,
        node_account: Option<Address>,
        jobs: Option<JobStore>,
    ) -> Self {
        Self {
            header,
            balances: BalanceStore::new(state.clone()),
            validators: ValidatorStore::new(state.clone()),
            proposals: ProposalStore::new(state.clone()),
            proposal_funds: ProposalFundStore::new(state.clone()),
            proposal_votes: ProposalVoteStore::new(state.clone()),
            btc_trackers: TrackerStore::new_btc(state.clone()),
            eth_trackers: TrackerStore::new_eth(state.clone()),
            swaps: SwapStore::new(state.clone()),
            contracts: ContractStore::new(state.clone()),
            fee_pool: FeePoolStore::new(state),
            currencies,
            fee_opt,
            governance_options,
            node_account,
            jobs,
        }
    }
}

// The four operations every transaction handler exposes
pub trait Handler: Send + Sync {
    // Stateless (or read-only) checks: well-formedness, signatures over
    // the raw bytes, fee floor, known currencies
    fn validate(&self, ctx: &Context, tx: &SignedTx) -> Result<(), VerificationError>;

    // Deterministic dry run against the check overlay
    fn process_check(&self, ctx: &Context, tx: &RawTx) -> (bool, Response);

    // Deterministic state mutation against the deliver overlay
    fn process_deliver(&self, ctx: &Context, tx: &RawTx) -> (bool, Response);

    // Debit the fee and credit the fee pool; runs even when deliver
    // failed, provided Validate passed
    fn process_fee(
        &self,
        ctx: &Context,
        tx: &SignedTx,
        gas_start: i64,
        gas_used: i64,
    ) -> (bool, Response) {
        basic_fee_handling(ctx, tx, gas_start, gas_used)
    }
}

// Default fee policy: the full declared fee is debited from the first
// signer and credited to the fee pool
pub fn basic_fee_handling(
    ctx: &Context,
    tx: &SignedTx,
    gas_start: i64,
    gas_used: i64,
) -> (bool, Response) {
    let signers = tx.signer_addresses();
    let Some(payer) = signers.first() else {
        return (false, Response::failed("transaction has no signer"));
    };

    if let Err(err) = ctx.balances.minus_from_address(payer, &tx.raw.fee) {
        return (false, Response::failed(format!("fee debit failed: {}", err)));
    }
    if let Err(err) = ctx.fee_pool.add_to_pool(&tx.raw.fee) {
        return (false, Response::failed(format!("fee credit failed: {}", err)));
    }

    let gas_wanted = tx.raw.size() as i64;
    (
        true,
        Response {
            gas_wanted,
            gas_used: (gas_start + gas_used).min(gas_wanted),
            ..Default::default()
        },
    )
}

// Tag-based dispatch from transaction type to its handler
// Registration is exclusive per type; a duplicate is a startup error
#[derive(Default)]
pub struct Router {
    handlers: IndexMap<TxType, Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        tx_type: TxType,
        handler: Box<dyn Handler>,
    ) -> Result<(), ChainError> {
        if self.handlers.contains_key(&tx_type) {
            return Err(ChainError::DuplicateHandler(tx_type));
        }
        debug!("registered handler for {}", tx_type);
        self.handlers.insert(tx_type, handler);
        Ok(())
    }

    pub fn handler(&self, tx_type: TxType) -> Result<&dyn Handler, ChainError> {
        self.handlers
            .get(&tx_type)
            .map(|handler| handler.as_ref())
            .ok_or(ChainError::HandlerNotFound(tx_type))
    }

    // The full handler table every node registers
    pub fn standard() -> Result<Self, ChainError> {
        let mut router = Router::new();
        router.register(TxType::Send, Box::new(send::SendHandler))?;
        router.register(TxType::ApplyValidator, Box::new(staking::ApplyValidatorHandler))?;
        router.register(TxType::Swap, Box::new(swap::SwapHandler))?;
        router.register(TxType::Publish, Box::new(swap::PublishHandler))?;
        router.register(TxType::EthLock, Box::new(eth_lock::EthLockHandler))?;
        router.register(
            TxType::ReportFinality,
            Box::new(eth_lock::ReportFinalityHandler),
        )?;
        router.register(
            TxType::ProposalCreate,
            Box::new(governance::ProposalCreateHandler),
        )?;
        router.register(
            TxType::ProposalFund,
            Box::new(governance::ProposalFundHandler),
        )?;
        router.register(
            TxType::ProposalVote,
            Box::new(governance::ProposalVoteHandler),
        )?;
        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut router = Router::new();
        router
            .register(TxType::Send, Box::new(send::SendHandler))
            .unwrap();
        let err = router
            .register(TxType::Send, Box::new(send::SendHandler))
            .unwrap_err();
        assert!(matches!(err, ChainError::DuplicateHandler(TxType::Send)));
    }

    #[test]
    fn unknown_type_has_no_handler() {
        let router = Router::new();
        assert!(matches!(
            router.handler(TxType::Send),
            Err(ChainError::HandlerNotFound(TxType::Send))
        ));
    }

    #[test]
    fn standard_router_covers_all_types() {
        let router = Router::standard().unwrap();
        for tx_type in [
            TxType::Send,
            TxType::ApplyValidator,
            TxType::Swap,
            TxType::Publish,
            TxType::EthLock,
            TxType::ReportFinality,
            TxType::ProposalCreate,
            TxType::ProposalFund,
            TxType::ProposalVote,
        ] {
            assert!(router.handler(tx_type).is_ok());
        }
    }
}
