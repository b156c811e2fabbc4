use super::{chains::ChainRegistry, expand_stage, Command, CommandBag, Op, SwapError};
use crate::core::{
    jobs::TxSubmitter,
    storage::{ChainState, State},
    stores::{ContractStore, SecretStore, SwapStore},
};
use log::{debug, info, warn};
use olt_common::{
    config::{LOCK_PERIOD_SECS, SECRET_SIZE},
    crypto::{hash, Hash, KeyPair},
    currency::{ChainKind, CurrencySet},
    fees::FeeOption,
    swap::{HtlcContract, Role, SwapEntity, SwapStage},
    transaction::{payload::PublishPayload, TransactionBuilder},
};
use rand::RngCore;
use std::sync::Arc;

// Injectable wall clock so refund deadlines are testable
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

// Runs the chain-touching commands of a swap stage against the external
// chain capabilities, then re-enters the outcome as a Publish transaction.
// Never called from the deliver path.
pub struct SwapExecutor {
    backend: Arc<ChainState>,
    chains: ChainRegistry,
    secrets: SecretStore,
    currencies: CurrencySet,
    submitter: Arc<dyn TxSubmitter>,
    node: Arc<KeyPair>,
    fee_opt: FeeOption,
    clock: Arc<dyn Clock>,
}

impl SwapExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<ChainState>,
        chains: ChainRegistry,
        currencies: CurrencySet,
        submitter: Arc<dyn TxSubmitter>,
        node: Arc<KeyPair>,
        fee_opt: FeeOption,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let secrets = SecretStore::new(backend.clone());
        Self {
            backend,
            chains,
            secrets,
            currencies,
            submitter,
            node,
            fee_opt,
            clock,
        }
    }

    fn swap_store(&self) -> SwapStore {
        SwapStore::new(State::shared(self.backend.clone()))
    }

    fn contract_store(&self) -> ContractStore {
        ContractStore::new(State::shared(self.backend.clone()))
    }

    // A lock this party already published for the swap, recorded on chain
    // state by an earlier publish; re-running the command reuses it
    // instead of locking funds twice
    fn published_contract(
        &self,
        bag: &CommandBag,
        chain: ChainKind,
    ) -> Result<Option<HtlcContract>, SwapError> {
        Ok(self
            .contract_store()
            .get(&bag.them_account.key, bag.nonce)?
            .filter(|contract| contract.chain == chain))
    }

    // Execute the full command sequence of one stage and publish the
    // outcome. Re-running a stage the swap has already moved past is a
    // no-op, detected by the replicated stage cursor.
    pub async fn run_stage(&self, swap_id: &Hash, stage: SwapStage) -> Result<(), SwapError> {
        let swap = self
            .swap_store()
            .get(swap_id)?
            .ok_or_else(|| SwapError::SwapNotFound(swap_id.clone()))?;
        if swap.stage != stage {
            // the committed cursor has not caught up yet: retry later;
            // a cursor already past the stage makes the job a no-op
            if stage_reachable(swap.stage, stage) {
                return Err(SwapError::StageNotReady(stage));
            }
            debug!("swap {} already past {}, skipping", swap_id, stage);
            return Ok(());
        }

        let node_account = self.node.address();
        let role = swap.role_of(&node_account).ok_or(SwapError::NotAParty)?;
        let bag = self.execute_stage(&swap, stage, role).await?;

        let contract = match crate::core::action::expected_contract_field(stage) {
            Some(_) => bag.contract.clone(),
            None => None,
        };
        let publish = PublishPayload {
            swap_id: swap_id.clone(),
            publisher: node_account,
            stage,
            contract,
            secret_hash: bag.secret_hash.clone(),
        };
        let tx = TransactionBuilder::new(self.fee_opt.clone()).build(&publish, &self.node);
        self.submitter
            .submit(tx)
            .await
            .map_err(|err| SwapError::AuditFailed(err.to_string()))?;
        info!("swap {} stage {} executed and published", swap_id, stage);
        Ok(())
    }

    async fn execute_stage(
        &self,
        swap: &SwapEntity,
        stage: SwapStage,
        role: Role,
    ) -> Result<CommandBag, SwapError> {
        let low = swap
            .low_chain(&self.currencies)
            .ok_or_else(|| SwapError::NotImplementedCurrency(swap.amount.currency.clone()))?;
        let high = swap
            .high_chain(&self.currencies)
            .ok_or_else(|| SwapError::NotImplementedCurrency(swap.exchange.currency.clone()))?;

        let commands = expand_stage(stage, role, low, high)?;
        if commands.is_empty() {
            return Err(SwapError::Expand(stage));
        }

        let (my_account, them_account) = match role {
            Role::Initiator => (swap.party.clone(), swap.counter_party.clone()),
            Role::Participant => (swap.counter_party.clone(), swap.party.clone()),
        };
        let mut bag = CommandBag {
            my_account,
            them_account,
            amount: swap.amount.clone(),
            exchange: swap.exchange.clone(),
            role,
            nonce: swap.nonce,
            secret: None,
            secret_hash: swap.secret_hash.clone(),
            contract: None,
        };

        // the initiator carries its secret into every stage it runs
        if role == Role::Initiator {
            if let Some(secret) = self.secrets.get(&bag.them_account.key, swap.nonce)? {
                bag.secret = Some(secret);
                bag.secret_hash = Some(hash(&secret));
            }
        }

        // commands run in order, each threading its output bag into the
        // next; the first failure aborts the stage
        for command in commands {
            bag = self.execute_command(swap, command, bag).await?;
        }
        Ok(bag)
    }

    async fn execute_command(
        &self,
        swap: &SwapEntity,
        command: Command,
        mut bag: CommandBag,
    ) -> Result<CommandBag, SwapError> {
        debug!("executing {:?} on {}", command.op, command.chain);
        let client = self
            .chains
            .get(command.chain)
            .ok_or(SwapError::ChainNotConfigured(command.chain))?;

        match command.op {
            Op::Initiate => {
                let secret = self.ensure_secret(&bag.them_account.key, bag.nonce)?;
                let secret_hash = hash(&secret);
                // a stale secret from an unrelated run would strand the
                // counter-party, so cross-check before locking funds
                if let Some(expected) = &bag.secret_hash {
                    if *expected != secret_hash {
                        return Err(SwapError::SecretMismatch);
                    }
                }

                if let Some(existing) = self.published_contract(&bag, command.chain)? {
                    debug!("lock already published for this swap, reusing");
                    bag.secret = Some(secret);
                    bag.secret_hash = Some(secret_hash);
                    bag.contract = Some(existing);
                    return Ok(bag);
                }

                let receiver = bag
                    .them_account
                    .account_on(command.chain)
                    .ok_or(SwapError::MissingContract)?;
                let timeout = self.clock.now() + 2 * LOCK_PERIOD_SECS;
                let contract = client
                    .initiate(&receiver.0, &bag.amount.value, &secret_hash, timeout)
                    .await?;

                bag.secret = Some(secret);
                bag.secret_hash = Some(secret_hash);
                bag.contract = Some(contract);
            }
            Op::AuditContract => {
                let contract = contract_on_chain(swap, command.chain, &self.currencies)
                    .ok_or(SwapError::MissingContract)?;
                let audit = client.audit(&contract).await?;

                let my_address = bag
                    .my_account
                    .account_on(command.chain)
                    .ok_or(SwapError::MissingContract)?;
                if audit.receiver != my_address.0 {
                    return Err(SwapError::AuditFailed("receiver is not this node".into()));
                }
                // the initiator receives the exchange, the participant
                // the amount
                let expected_value = match bag.role {
                    Role::Initiator => bag.exchange.value,
                    Role::Participant => bag.amount.value,
                };
                if audit.value != expected_value {
                    return Err(SwapError::AuditFailed(format!(
                        "value mismatch: expected {}, found {}",
                        expected_value, audit.value
                    )));
                }
                match &bag.secret_hash {
                    // the initiator knows the hash and pins it
                    Some(expected) if *expected != audit.secret_hash => {
                        return Err(SwapError::AuditFailed("secret hash mismatch".into()));
                    }
                    // the participant learns the hash from the audit
                    None => bag.secret_hash = Some(audit.secret_hash.clone()),
                    _ => {}
                }
                bag.contract = Some(contract);
            }
            Op::Participate => {
                let secret_hash = bag
                    .secret_hash
                    .clone()
                    .ok_or_else(|| SwapError::AuditFailed("no secret hash".into()))?;
                if let Some(existing) = self.published_contract(&bag, command.chain)? {
                    debug!("mirror lock already published for this swap, reusing");
                    bag.contract = Some(existing);
                    return Ok(bag);
                }
                let receiver = bag
                    .them_account
                    .account_on(command.chain)
                    .ok_or(SwapError::MissingContract)?;
                // the participant's timeout is strictly shorter, so the
                // initiator cannot strand the participant
                let timeout = self.clock.now() + LOCK_PERIOD_SECS;
                let contract = client
                    .initiate(&receiver.0, &bag.exchange.value, &secret_hash, timeout)
                    .await?;
                bag.contract = Some(contract);
            }
            Op::Redeem => {
                let contract = contract_on_chain(swap, command.chain, &self.currencies)
                    .ok_or(SwapError::MissingContract)?;
                let secret = bag.secret.ok_or(SwapError::ExtractSecretFailed)?;
                if hash(&secret) != contract.secret_hash {
                    return Err(SwapError::SecretMismatch);
                }
                client.redeem(&contract, secret).await?;
                bag.contract = Some(contract);
            }
            Op::ExtractSecret => {
                let contract = contract_on_chain(swap, command.chain, &self.currencies)
                    .ok_or(SwapError::MissingContract)?;
                let secret = client
                    .extract_secret(&contract, &contract.secret_hash)
                    .await
                    .map_err(|_| SwapError::ExtractSecretFailed)?;
                if hash(&secret) != contract.secret_hash {
                    return Err(SwapError::SecretMismatch);
                }
                bag.secret = Some(secret);
                bag.contract = Some(contract);
            }
            Op::Refund => {
                let contract = contract_on_chain(swap, command.chain, &self.currencies)
                    .ok_or(SwapError::MissingContract)?;
                client.refund(&contract).await?;
                bag.contract = Some(contract);
            }
        }
        Ok(bag)
    }

    // Load the secret for this counter-party, generating and persisting a
    // fresh one on first use
    fn ensure_secret(
        &self,
        counter_party: &olt_common::crypto::Address,
        nonce: u64,
    ) -> Result<[u8; SECRET_SIZE], SwapError> {
        if let Some(secret) = self.secrets.get(counter_party, nonce)? {
            return Ok(secret);
        }
        let mut secret = [0u8; SECRET_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        self.secrets.set(counter_party, nonce, &secret)?;
        Ok(secret)
    }

    // Look for swaps whose own lock has expired without completing and
    // drive the refund branch for them
    pub async fn check_refunds(&self) {
        let swaps = match self.swap_store().iterate_matched() {
            Ok(swaps) => swaps,
            Err(err) => {
                warn!("refund scan failed: {}", err);
                return;
            }
        };
        let node_account = self.node.address();
        let now = self.clock.now();

        for swap in swaps {
            if matches!(swap.stage, SwapStage::Finish | SwapStage::Refund) {
                continue;
            }
            let Some(role) = swap.role_of(&node_account) else {
                continue;
            };
            let own_chain = match (role, swap.chains(&self.currencies)) {
                (Role::Initiator, Some(chains)) => chains[1],
                (Role::Participant, Some(chains)) => chains[2],
                _ => continue,
            };
            let Some(contract) = contract_on_chain(&swap, own_chain, &self.currencies) else {
                continue;
            };
            if now <= contract.timeout {
                continue;
            }

            info!(
                "swap {} lock expired at {}, refunding",
                swap.id(),
                contract.timeout
            );
            let result = self.execute_stage(&swap, SwapStage::Refund, role).await;
            match result {
                Ok(_) => {
                    let publish = PublishPayload {
                        swap_id: swap.id(),
                        publisher: node_account.clone(),
                        stage: SwapStage::Refund,
                        contract: None,
                        secret_hash: None,
                    };
                    let tx =
                        TransactionBuilder::new(self.fee_opt.clone()).build(&publish, &self.node);
                    if let Err(err) = self.submitter.submit(tx).await {
                        warn!("failed to publish refund: {}", err);
                    }
                }
                Err(err) => warn!("refund of swap {} failed: {}", swap.id(), err),
            }
        }
    }

    // Drop secrets of swaps that have reached a terminal stage
    pub fn cleanup_finished(&self) {
        let Ok(swaps) = self.swap_store().iterate_matched() else {
            return;
        };
        let node_account = self.node.address();
        for swap in swaps {
            if !matches!(swap.stage, SwapStage::Finish | SwapStage::Refund) {
                continue;
            }
            if swap.party.key == node_account {
                if let Err(err) = self.secrets.delete(&swap.counter_party.key, swap.nonce) {
                    warn!("failed to drop secret for swap {}: {}", swap.id(), err);
                }
            }
        }
    }
}

// Whether the stage machine can still advance from `from` to `to`
fn stage_reachable(from: SwapStage, to: SwapStage) -> bool {
    let mut cursor = from;
    loop {
        if cursor == to {
            return true;
        }
        match cursor.out_stage() {
            Some(next) => cursor = next,
            None => return false,
        }
    }
}

// The contract recorded for a given chain: the low chain holds the
// initiator's lock, the high chain the participant's mirror
fn contract_on_chain(
    swap: &SwapEntity,
    chain: ChainKind,
    currencies: &CurrencySet,
) -> Option<HtlcContract> {
    let low = swap.low_chain(currencies)?;
    if chain == low {
        swap.contract_low.clone()
    } else {
        swap.contract_high.clone()
    }
}
