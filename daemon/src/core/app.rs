use crate::core::{
    action::{Context, Router},
    driver::{
        code_of, Header, RequestBeginBlock, RequestEndBlock, RequestInitChain, RequestQuery,
        ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock, ResponseInfo,
        ResponseInitChain, ResponseQuery, ValidatorUpdate,
    },
    error::ChainError,
    governance::enact_proposals,
    jobs::JobStore,
    storage::{ChainState, SharedState, State, STORE_ORDER},
    stores::Validator,
};
use log::{debug, error, info};
use olt_common::{
    config::NATIVE_CURRENCY,
    crypto::{ripemd160, Address},
    currency::CurrencySet,
    fees::FeeOption,
    genesis::GovernanceOptions,
    serializer::Serializer,
    transaction::SignedTx,
};
use serde::Serialize;
use std::sync::Arc;

const APP_NAME: &str = "olt-core";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// JSON input of the app hash: the store roots in STORE_ORDER
#[derive(Serialize)]
struct AppHash {
    hashes: Vec<String>,
}

// The replicated application behind the consensus driver
// One instance per validator node; all methods are serialized by the
// driver, so state mutation is single threaded per block
pub struct Application {
    backend: Arc<ChainState>,
    // overlay committed at Commit
    deliver: SharedState,
    // overlay discarded at every BeginBlock
    check: SharedState,
    router: Router,
    header: Header,
    chain_id: String,
    currencies: CurrencySet,
    fee_opt: FeeOption,
    governance_options: GovernanceOptions,
    node_account: Option<Address>,
    jobs: Option<JobStore>,
    last_app_hash: Vec<u8>,
}

impl Application {
    pub fn new(backend: Arc<ChainState>) -> Result<Self, ChainError> {
        Ok(Self {
            deliver: State::shared(backend.clone()),
            check: State::shared(backend.clone()),
            backend,
            router: Router::standard()?,
            header: Header::default(),
            chain_id: String::new(),
            currencies: CurrencySet::new(),
            fee_opt: FeeOption::default(),
            governance_options: GovernanceOptions::default(),
            node_account: None,
            jobs: None,
            last_app_hash: Vec::new(),
        })
    }

    // Identify this node as a swap party and give it a job queue
    pub fn with_node_account(mut self, account: Address) -> Self {
        self.node_account = Some(account);
        self.jobs = Some(JobStore::new(self.backend.clone()));
        self
    }

    pub fn backend(&self) -> Arc<ChainState> {
        self.backend.clone()
    }

    pub fn currencies(&self) -> &CurrencySet {
        &self.currencies
    }

    pub fn fee_option(&self) -> &FeeOption {
        &self.fee_opt
    }

    fn context(&self, state: SharedState, with_jobs: bool) -> Context {
        Context::new(
            self.header.clone(),
            state,
            self.currencies.clone(),
            self.fee_opt.clone(),
            self.governance_options.clone(),
            self.node_account.clone(),
            if with_jobs { self.jobs.clone() } else { None },
        )
    }

    fn deliver_context(&self) -> Context {
        self.context(self.deliver.clone(), true)
    }

    fn check_context(&self) -> Context {
        self.context(self.check.clone(), false)
    }

    pub fn info(&self) -> ResponseInfo {
        ResponseInfo {
            data: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            last_block_height: self.header.height,
            last_block_app_hash: self.last_app_hash.clone(),
        }
    }

    // Read an exact key from the committed state
    pub fn query(&self, req: RequestQuery) -> ResponseQuery {
        match self.backend.get(&req.key) {
            Ok(Some(value)) => ResponseQuery {
                code: code_of(true),
                key: req.key,
                value,
                height: self.header.height,
            },
            Ok(None) => ResponseQuery {
                code: code_of(false),
                key: req.key,
                value: Vec::new(),
                height: self.header.height,
            },
            Err(err) => {
                error!("query failed: {}", err);
                ResponseQuery {
                    code: code_of(false),
                    key: req.key,
                    value: Vec::new(),
                    height: self.header.height,
                }
            }
        }
    }

    // Load genesis, register currencies, seed the initial validator set
    // and return it to the driver
    pub fn init_chain(&mut self, req: RequestInitChain) -> Result<ResponseInitChain, ChainError> {
        let genesis = req.genesis;

        // a genesis without the native currency cannot run at all
        if !genesis
            .currencies
            .iter()
            .any(|currency| currency.name == NATIVE_CURRENCY)
        {
            panic!("no default currency available in the network");
        }
        if let Err(err) = genesis.governance.validate() {
            panic!("misconfigured governance options: {}", err);
        }

        self.chain_id = genesis.chain_id.clone();
        self.header.chain_id = genesis.chain_id.clone();
        for currency in &genesis.currencies {
            self.currencies.register(currency.clone());
        }
        self.fee_opt = genesis.fee_option.clone();
        self.governance_options = genesis.governance.clone();

        let ctx = self.deliver_context();
        for balance in &genesis.balances {
            for coin in &balance.coins {
                ctx.balances.add_to_address(&balance.address, coin)?;
            }
        }
        for validator in &genesis.validators {
            ctx.validators.set(&Validator {
                address: validator.address.clone(),
                stake_address: validator.stake_address.clone(),
                pubkey: validator.pubkey.clone(),
                ecdsa_pubkey: validator.ecdsa_pubkey.clone(),
                name: validator.name.clone(),
                staked: validator.staked,
                power: validator.staked.as_power(),
            })?;
        }
        // report the seeded set and remember it as reported
        let validators = ctx.validators.get_end_block_update()?;

        {
            let mut deliver = self
                .deliver
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            deliver.commit()?;
        }

        info!(
            "chain {} initialized with {} currencies, {} validators",
            self.chain_id,
            self.currencies.len(),
            validators.len()
        );
        Ok(ResponseInitChain { validators })
    }

    // Update the header and feed signers and byzantine evidence to the
    // validator store; the check overlay starts fresh every block
    pub fn begin_block(&mut self, req: RequestBeginBlock) -> Result<(), ChainError> {
        let RequestBeginBlock {
            header,
            signers,
            byzantine,
        } = req;
        debug!(
            "begin block height={} app_hash={}",
            header.height,
            hex::encode(&header.app_hash)
        );
        self.header = header;

        let ctx = self.deliver_context();
        ctx.validators.set_begin_block(&signers, &byzantine)?;

        self.check
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .reset();
        Ok(())
    }

    // Validate then dry-run against the discardable check overlay
    pub fn check_tx(&self, tx_bytes: &[u8]) -> ResponseCheckTx {
        let tx = match SignedTx::from_bytes(tx_bytes) {
            Ok(tx) => tx,
            Err(err) => {
                return ResponseCheckTx {
                    code: code_of(false),
                    log: format!("failed to deserialize tx: {}", err),
                    ..Default::default()
                }
            }
        };

        let ctx = self.check_context();
        let handler = match self.router.handler(tx.tx_type()) {
            Ok(handler) => handler,
            Err(err) => {
                return ResponseCheckTx {
                    code: code_of(false),
                    log: err.to_string(),
                    ..Default::default()
                }
            }
        };

        if let Err(err) = handler.validate(&ctx, &tx) {
            debug!("check tx invalid: {}", err);
            return ResponseCheckTx {
                code: code_of(false),
                log: err.to_string(),
                ..Default::default()
            };
        }

        let (ok, response) = handler.process_check(&ctx, &tx.raw);
        ResponseCheckTx {
            code: code_of(ok),
            data: response.data,
            log: response.log,
            gas_wanted: response.gas_wanted,
            gas_used: response.gas_used,
            tags: response.tags,
        }
    }

    // Validate, deliver and charge the fee; a failed deliver rolls back
    // its own writes while earlier transactions of the block survive
    pub fn deliver_tx(&self, tx_bytes: &[u8]) -> ResponseDeliverTx {
        let tx = match SignedTx::from_bytes(tx_bytes) {
            Ok(tx) => tx,
            Err(err) => {
                return ResponseDeliverTx {
                    code: code_of(false),
                    log: format!("failed to deserialize tx: {}", err),
                    ..Default::default()
                }
            }
        };

        let ctx = self.deliver_context();
        let handler = match self.router.handler(tx.tx_type()) {
            Ok(handler) => handler,
            Err(err) => {
                return ResponseDeliverTx {
                    code: code_of(false),
                    log: err.to_string(),
                    ..Default::default()
                }
            }
        };

        if let Err(err) = handler.validate(&ctx, &tx) {
            // no fee on a transaction that never validated
            return ResponseDeliverTx {
                code: code_of(false),
                log: err.to_string(),
                ..Default::default()
            };
        }

        let before = self
            .deliver
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot();
        let (ok, mut response) = handler.process_deliver(&ctx, &tx.raw);
        if !ok {
            error!("deliver failed: {}", response.log);
            self.deliver
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .rollback(before);
        }

        // the fee is charged even when deliver failed, as long as
        // Validate passed; a failed fee voids the whole transaction
        let fee_snapshot = self
            .deliver
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot();
        let (fee_ok, fee_response) = handler.process_fee(&ctx, &tx, 0, response.gas_used);
        if !fee_ok {
            error!("fee processing failed: {}", fee_response.log);
            self.deliver
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .rollback(fee_snapshot);
            return ResponseDeliverTx {
                code: code_of(false),
                log: format!("{}; {}", response.log, fee_response.log),
                ..Default::default()
            };
        }
        response.gas_wanted = fee_response.gas_wanted;
        response.gas_used = fee_response.gas_used;

        ResponseDeliverTx {
            code: code_of(ok),
            data: response.data,
            log: response.log,
            gas_wanted: response.gas_wanted,
            gas_used: response.gas_used,
            tags: response.tags,
        }
    }

    // Validator-set diff plus governance enactment
    pub fn end_block(&self, req: RequestEndBlock) -> Result<ResponseEndBlock, ChainError> {
        debug!("end block height={}", req.height);
        let ctx = self.deliver_context();
        enact_proposals(&ctx)?;
        let validator_updates: Vec<ValidatorUpdate> = ctx.validators.get_end_block_update()?;
        Ok(ResponseEndBlock { validator_updates })
    }

    // Commit the deliver overlay and fold the store roots into the app
    // hash: RIPEMD160 over the JSON of the fixed-order root list
    pub fn commit(&mut self) -> Result<ResponseCommit, ChainError> {
        let version = {
            let mut deliver = self
                .deliver
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            deliver.commit()?
        };

        let mut hashes = Vec::with_capacity(STORE_ORDER.len());
        for prefix in STORE_ORDER {
            hashes.push(self.backend.store_root(prefix)?.to_hex());
        }
        let encoded = serde_json::to_vec(&AppHash { hashes }).map_err(ChainError::Serialization)?;
        let app_hash = ripemd160(&encoded).to_vec();

        info!(
            "committed block height={} version={} hash={}",
            self.header.height,
            version,
            hex::encode(&app_hash)
        );
        self.last_app_hash = app_hash.clone();
        Ok(ResponseCommit { app_hash, version })
    }
}
