use crate::core::{
    app::Application,
    driver::{Header, RequestBeginBlock, RequestEndBlock, RequestInitChain, ResponseDeliverTx},
    jobs::TxSubmitter,
    storage::ChainState,
    swap::chains::{ChainClientError, HtlcAudit, HtlcChain},
    swap::executor::Clock,
};
use async_trait::async_trait;
use olt_common::{
    crypto::{hash, Hash, KeyPair},
    currency::{Amount, ChainKind, Coin},
    fees::FeeOption,
    genesis::{GenesisBalance, GenesisState, GenesisValidator},
    serializer::Serializer,
    swap::HtlcContract,
    transaction::{payload::Payload, SignedTx, TransactionBuilder},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

pub const FUNDED: u64 = 1_000_000_000;

pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_seed([seed; 32])
}

// A genesis with `validator_seeds` staked validators and every listed
// account funded with OLT and VT
pub fn test_genesis(validator_seeds: &[u8], funded_seeds: &[u8]) -> GenesisState {
    let mut genesis = GenesisState::dev("olt-test");
    // short deadlines keep enactment tests within a few blocks
    genesis.governance.general.funding_deadline_blocks = 10;
    genesis.governance.general.voting_deadline_blocks = 20;
    genesis.governance.general.funding_goal = Amount::from_u64(100);
    genesis.governance.general.pass_percent = 67;

    for seed in validator_seeds {
        let pair = keypair(*seed);
        genesis.validators.push(GenesisValidator {
            address: pair.address(),
            stake_address: pair.address(),
            pubkey: pair.public_key(),
            ecdsa_pubkey: Default::default(),
            name: format!("node-{}", seed),
            staked: Amount::from_u64(2),
        });
    }
    for seed in funded_seeds {
        let pair = keypair(*seed);
        genesis.balances.push(GenesisBalance {
            address: pair.address(),
            coins: vec![
                Coin::new("OLT", Amount::from_u64(FUNDED)),
                Coin::new("VT", Amount::from_u64(FUNDED)),
            ],
        });
    }
    genesis
}

pub fn new_app(genesis: &GenesisState) -> Application {
    let backend = ChainState::in_memory().unwrap();
    let mut app = Application::new(backend).unwrap();
    app.init_chain(RequestInitChain {
        genesis: genesis.clone(),
    })
    .unwrap();
    app
}

pub fn new_party_app(genesis: &GenesisState, node: &KeyPair) -> Application {
    let backend = ChainState::in_memory().unwrap();
    let mut app = Application::new(backend)
        .unwrap()
        .with_node_account(node.address());
    app.init_chain(RequestInitChain {
        genesis: genesis.clone(),
    })
    .unwrap();
    app
}

pub fn begin_block(app: &mut Application, height: u64) {
    app.begin_block(RequestBeginBlock {
        header: Header {
            chain_id: "olt-test".to_string(),
            height,
            time: height * 10,
            app_hash: Vec::new(),
        },
        signers: Vec::new(),
        byzantine: Vec::new(),
    })
    .unwrap();
}

pub fn build_tx<P: Payload>(payload: &P, pair: &KeyPair) -> SignedTx {
    TransactionBuilder::new(FeeOption::default()).build(payload, pair)
}

pub fn deliver(app: &Application, tx: &SignedTx) -> ResponseDeliverTx {
    app.deliver_tx(&tx.to_bytes())
}

pub fn deliver_ok(app: &Application, tx: &SignedTx) {
    let response = deliver(app, tx);
    assert_eq!(response.code, 0, "deliver failed: {}", response.log);
}

// Close the block: governance enactment, validator diff, commit
pub fn end_and_commit(app: &mut Application, height: u64) -> Vec<u8> {
    app.end_block(RequestEndBlock { height }).unwrap();
    app.commit().unwrap().app_hash
}

// ===== Test doubles for the off-chain side =====

pub struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    pub fn new(now: u64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(now),
        })
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Redeemed,
    Refunded,
}

#[derive(Clone, Debug)]
pub struct MockLock {
    pub receiver: Vec<u8>,
    pub value: Amount,
    pub secret_hash: Hash,
    pub timeout: u64,
    pub state: LockState,
    pub revealed_secret: Option<[u8; 32]>,
}

// In-memory HTLC facility with the reveal-on-redeem property of the real
// chains: redeeming publishes the secret, which extract_secret then reads
pub struct MockChain {
    kind: ChainKind,
    clock: Arc<MockClock>,
    pub locks: Mutex<HashMap<Vec<u8>, MockLock>>,
    counter: AtomicU64,
    pub broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl MockChain {
    pub fn new(kind: ChainKind, clock: Arc<MockClock>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            clock,
            locks: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            broadcasts: Mutex::new(Vec::new()),
        })
    }

}

#[async_trait]
impl HtlcChain for MockChain {
    fn kind(&self) -> ChainKind {
        self.kind
    }

    async fn initiate(
        &self,
        receiver: &[u8],
        value: &Amount,
        secret_hash: &Hash,
        timeout: u64,
    ) -> Result<HtlcContract, ChainClientError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut seed = secret_hash.as_ref().to_vec();
        seed.extend_from_slice(&id.to_be_bytes());
        let address = hash(&seed).as_ref()[..20].to_vec();

        self.locks.lock().unwrap().insert(
            address.clone(),
            MockLock {
                receiver: receiver.to_vec(),
                value: *value,
                secret_hash: secret_hash.clone(),
                timeout,
                state: LockState::Locked,
                revealed_secret: None,
            },
        );
        Ok(HtlcContract {
            chain: self.kind,
            address,
            raw_tx: vec![0xaa, id as u8],
            secret_hash: secret_hash.clone(),
            receiver: receiver.to_vec(),
            value: *value,
            timeout,
        })
    }

    async fn audit(&self, contract: &HtlcContract) -> Result<HtlcAudit, ChainClientError> {
        let locks = self.locks.lock().unwrap();
        let lock = locks
            .get(&contract.address)
            .ok_or(ChainClientError::ContractNotFound)?;
        Ok(HtlcAudit {
            receiver: lock.receiver.clone(),
            value: lock.value,
            secret_hash: lock.secret_hash.clone(),
            timeout: lock.timeout,
        })
    }

    async fn redeem(
        &self,
        contract: &HtlcContract,
        secret: [u8; 32],
    ) -> Result<(), ChainClientError> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks
            .get_mut(&contract.address)
            .ok_or(ChainClientError::ContractNotFound)?;
        if lock.state != LockState::Locked {
            return Err(ChainClientError::Rejected("lock is spent".into()));
        }
        if hash(&secret) != lock.secret_hash {
            return Err(ChainClientError::Rejected("wrong secret".into()));
        }
        lock.state = LockState::Redeemed;
        lock.revealed_secret = Some(secret);
        Ok(())
    }

    async fn refund(&self, contract: &HtlcContract) -> Result<(), ChainClientError> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks
            .get_mut(&contract.address)
            .ok_or(ChainClientError::ContractNotFound)?;
        if lock.state != LockState::Locked {
            return Err(ChainClientError::Rejected("lock is spent".into()));
        }
        if self.clock.now() <= lock.timeout {
            return Err(ChainClientError::TimeoutNotReached);
        }
        lock.state = LockState::Refunded;
        Ok(())
    }

    async fn extract_secret(
        &self,
        _contract: &HtlcContract,
        secret_hash: &Hash,
    ) -> Result<[u8; 32], ChainClientError> {
        let locks = self.locks.lock().unwrap();
        // the secret becomes public on whichever lock of this hash was
        // redeemed first
        locks
            .values()
            .find(|lock| lock.secret_hash == *secret_hash && lock.revealed_secret.is_some())
            .and_then(|lock| lock.revealed_secret)
            .ok_or(ChainClientError::NotRedeemed)
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), ChainClientError> {
        self.broadcasts.lock().unwrap().push(raw_tx.to_vec());
        Ok(())
    }
}

// Collects result transactions from background jobs so tests can feed
// them back into the block pipeline
#[derive(Default)]
pub struct CollectSubmitter {
    pub submitted: Mutex<Vec<SignedTx>>,
}

impl CollectSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn drain(&self) -> Vec<SignedTx> {
        std::mem::take(&mut self.submitted.lock().unwrap())
    }
}

#[async_trait]
impl TxSubmitter for CollectSubmitter {
    async fn submit(&self, tx: SignedTx) -> anyhow::Result<()> {
        self.submitted.lock().unwrap().push(tx);
        Ok(())
    }
}
