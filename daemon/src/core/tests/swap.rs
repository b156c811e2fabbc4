use super::{app::state_context, support::*};
use crate::core::{
    app::Application,
    jobs::{JobExecutor, JobStore},
    swap::{
        chains::{ChainRegistry, HtlcChain},
        executor::SwapExecutor,
    },
};
use indexmap::IndexMap;
use olt_common::{
    config::LOCK_PERIOD_SECS,
    currency::{Amount, ChainKind, Coin, CurrencySet},
    fees::FeeOption,
    genesis::GenesisState,
    swap::{ChainAddress, Party, SwapStage},
    transaction::payload::SwapInitPayload,
};
use std::sync::Arc;

const ALICE: u8 = 1;
const BOB: u8 = 2;
const NONCE: u64 = 7;

fn currency_set(genesis: &GenesisState) -> CurrencySet {
    let mut set = CurrencySet::new();
    for currency in &genesis.currencies {
        set.register(currency.clone());
    }
    set
}

fn party(seed: u8) -> Party {
    let pair = keypair(seed);
    let mut accounts = IndexMap::new();
    accounts.insert(
        ChainKind::Bitcoin,
        ChainAddress(format!("btc-{}", seed).into_bytes()),
    );
    accounts.insert(
        ChainKind::Ethereum,
        ChainAddress(format!("eth-{}", seed).into_bytes()),
    );
    Party {
        key: pair.address(),
        accounts,
    }
}

// Alice offers 1 BTC for 10 ETH; Bob offers the mirror
fn swap_requests() -> (SwapInitPayload, SwapInitPayload) {
    let alice = SwapInitPayload {
        chain_id: "olt-test".to_string(),
        party: party(ALICE),
        counter_party: party(BOB),
        amount: Coin::new("BTC", Amount::from_u64(1)),
        exchange: Coin::new("ETH", Amount::from_u64(10)),
        fee: Coin::new("OLT", Amount::zero()),
        nonce: NONCE,
    };
    let bob = SwapInitPayload {
        chain_id: "olt-test".to_string(),
        party: party(BOB),
        counter_party: party(ALICE),
        amount: Coin::new("ETH", Amount::from_u64(10)),
        exchange: Coin::new("BTC", Amount::from_u64(1)),
        fee: Coin::new("OLT", Amount::zero()),
        nonce: NONCE,
    };
    (alice, bob)
}

struct SwapHarness {
    clock: Arc<MockClock>,
    btc: Arc<MockChain>,
    eth: Arc<MockChain>,
    alice_app: Application,
    bob_app: Application,
    alice_submitter: Arc<CollectSubmitter>,
    bob_submitter: Arc<CollectSubmitter>,
    alice_jobs: JobExecutor,
    bob_jobs: JobExecutor,
    height: u64,
}

impl SwapHarness {
    fn new() -> Self {
        Self::with_validators(&[10])
    }

    fn with_validators(validators: &[u8]) -> Self {
        let genesis = test_genesis(validators, &[ALICE, BOB]);
        let clock = MockClock::new(1_000);
        let btc = MockChain::new(ChainKind::Bitcoin, clock.clone());
        let eth = MockChain::new(ChainKind::Ethereum, clock.clone());

        let alice_app = new_party_app(&genesis, &keypair(ALICE));
        let bob_app = new_party_app(&genesis, &keypair(BOB));
        let alice_submitter = CollectSubmitter::new();
        let bob_submitter = CollectSubmitter::new();

        let alice_jobs = Self::executor(
            &genesis,
            &alice_app,
            ALICE,
            &btc,
            &eth,
            &clock,
            &alice_submitter,
        );
        let bob_jobs = Self::executor(
            &genesis, &bob_app, BOB, &btc, &eth, &clock, &bob_submitter,
        );

        Self {
            clock,
            btc,
            eth,
            alice_app,
            bob_app,
            alice_submitter,
            bob_submitter,
            alice_jobs,
            bob_jobs,
            height: 0,
        }
    }

    fn executor(
        genesis: &GenesisState,
        app: &Application,
        seed: u8,
        btc: &Arc<MockChain>,
        eth: &Arc<MockChain>,
        clock: &Arc<MockClock>,
        submitter: &Arc<CollectSubmitter>,
    ) -> JobExecutor {
        let bitcoin: Arc<dyn HtlcChain> = btc.clone();
        let ethereum: Arc<dyn HtlcChain> = eth.clone();
        let chains = ChainRegistry::new(Some(bitcoin), Some(ethereum));
        let pair = Arc::new(keypair(seed));
        let swaps = SwapExecutor::new(
            app.backend(),
            chains.clone(),
            currency_set(genesis),
            submitter.clone(),
            pair.clone(),
            FeeOption::default(),
            clock.clone(),
        );
        JobExecutor::new(
            JobStore::new(app.backend()),
            swaps,
            chains,
            app.backend(),
            submitter.clone(),
            pair,
            FeeOption::default(),
        )
    }

    // Deliver a block with the given transactions to both replicas and
    // assert they commit the same app hash
    fn block(&mut self, txs: &[olt_common::transaction::SignedTx]) -> Vec<u8> {
        self.height += 1;
        begin_block(&mut self.alice_app, self.height);
        begin_block(&mut self.bob_app, self.height);
        for tx in txs {
            deliver_ok(&self.alice_app, tx);
            deliver_ok(&self.bob_app, tx);
        }
        let alice_hash = end_and_commit(&mut self.alice_app, self.height);
        let bob_hash = end_and_commit(&mut self.bob_app, self.height);
        assert_eq!(alice_hash, bob_hash, "replicas diverged");
        alice_hash
    }

    // One round of off-chain work on both parties, returning the result
    // transactions they published
    async fn run_jobs(&self) -> Vec<olt_common::transaction::SignedTx> {
        self.alice_jobs.run_pending().await;
        self.bob_jobs.run_pending().await;
        let mut txs = self.alice_submitter.drain();
        txs.extend(self.bob_submitter.drain());
        txs
    }

    fn swap_id(&self) -> olt_common::crypto::Hash {
        let (alice, bob) = swap_requests();
        // BTC has the lower currency id, so Alice's side initiates
        olt_common::swap::swap_id(&alice.party.key, &bob.party.key, NONCE)
    }

    fn stage(&self) -> SwapStage {
        let ctx = state_context(&self.alice_app);
        ctx.swaps.get(&self.swap_id()).unwrap().unwrap().stage
    }
}

#[tokio::test]
async fn swap_happy_path_redeems_both_chains() {
    let mut harness = SwapHarness::new();
    let (alice_request, bob_request) = swap_requests();

    // the first request parks, the mirror request matches
    let alice_tx = build_tx(&alice_request, &keypair(ALICE));
    let bob_tx = build_tx(&bob_request, &keypair(BOB));
    harness.block(&[alice_tx, bob_tx]);
    assert_eq!(harness.stage(), SwapStage::InitiatorInitiate);

    // drive stages until no party has work left
    let mut rounds = 0;
    loop {
        let txs = harness.run_jobs().await;
        if txs.is_empty() {
            break;
        }
        harness.block(&txs);
        rounds += 1;
        assert!(rounds <= 8, "swap did not converge");
    }

    assert_eq!(harness.stage(), SwapStage::Finish);

    // both locks were redeemed: BTC moved to Bob, ETH moved to Alice
    let btc_locks = harness.btc.locks.lock().unwrap();
    assert_eq!(btc_locks.len(), 1);
    let btc_lock = btc_locks.values().next().unwrap();
    assert_eq!(btc_lock.state, LockState::Redeemed);
    assert_eq!(btc_lock.receiver, b"btc-2".to_vec());
    assert_eq!(btc_lock.value, Amount::from_u64(1));

    let eth_locks = harness.eth.locks.lock().unwrap();
    assert_eq!(eth_locks.len(), 1);
    let eth_lock = eth_locks.values().next().unwrap();
    assert_eq!(eth_lock.state, LockState::Redeemed);
    assert_eq!(eth_lock.receiver, b"eth-1".to_vec());
    assert_eq!(eth_lock.value, Amount::from_u64(10));

    // the participant's lock expires before the initiator's
    assert!(eth_lock.timeout < btc_lock.timeout);
    drop(btc_locks);
    drop(eth_locks);

    // each published lock transaction is tracked on its chain
    let ctx = state_context(&harness.alice_app);
    let swap = ctx.swaps.get(&harness.swap_id()).unwrap().unwrap();
    let low_raw = swap.contract_low.as_ref().unwrap().raw_tx.clone();
    let tracker = ctx
        .btc_trackers
        .get(&olt_common::crypto::hash(&low_raw))
        .unwrap()
        .unwrap();
    assert_eq!(tracker.state, olt_common::tracker::TrackerState::New);
    assert_eq!(tracker.process_owner, keypair(ALICE).address());
}

#[tokio::test]
async fn swap_refunds_when_participant_never_mirrors() {
    let mut harness = SwapHarness::new();
    let (alice_request, bob_request) = swap_requests();

    let alice_tx = build_tx(&alice_request, &keypair(ALICE));
    let bob_tx = build_tx(&bob_request, &keypair(BOB));
    harness.block(&[alice_tx, bob_tx]);

    // only the initiator works; the participant is down
    harness.alice_jobs.run_pending().await;
    let txs = harness.alice_submitter.drain();
    assert_eq!(txs.len(), 1);
    harness.block(&txs);
    assert_eq!(harness.stage(), SwapStage::ParticipantParticipate);

    // before the timeout the refund scan leaves the lock alone
    harness.alice_jobs.swap_executor().check_refunds().await;
    assert!(harness.alice_submitter.drain().is_empty());

    // past twice the lock period the initiator's HTLC refunds
    harness.clock.advance(2 * LOCK_PERIOD_SECS + 1);
    harness.alice_jobs.swap_executor().check_refunds().await;
    let refunds = harness.alice_submitter.drain();
    assert_eq!(refunds.len(), 1);
    harness.block(&refunds);

    assert_eq!(harness.stage(), SwapStage::Refund);

    // no funds changed hands on either chain
    let btc_locks = harness.btc.locks.lock().unwrap();
    assert_eq!(btc_locks.values().next().unwrap().state, LockState::Refunded);
    assert!(harness.eth.locks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_requests_do_not_match() {
    let harness = {
        let mut harness = SwapHarness::new();
        let (alice_request, mut bob_request) = swap_requests();
        // Bob asks for 2 BTC instead of the offered 1
        bob_request.exchange = Coin::new("BTC", Amount::from_u64(2));

        let alice_tx = build_tx(&alice_request, &keypair(ALICE));
        harness.height += 1;
        begin_block(&mut harness.alice_app, harness.height);
        deliver_ok(&harness.alice_app, &alice_tx);

        let bob_tx = build_tx(&bob_request, &keypair(BOB));
        let response = deliver(&harness.alice_app, &bob_tx);
        assert_ne!(response.code, 0, "mismatched request must be rejected");
        end_and_commit(&mut harness.alice_app, harness.height);
        harness
    };

    let ctx = state_context(&harness.alice_app);
    assert!(ctx.swaps.get(&harness.swap_id()).unwrap().is_none());
    // Alice's request is still parked waiting for a real mirror
    assert!(ctx
        .swaps
        .get_unmatched(&party(BOB).key, NONCE)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn broadcast_job_attests_the_tracker() {
    use olt_common::{crypto::hash, tracker::TrackerState, transaction::payload::LockPayload};

    // Alice is the only validator, so her attestation alone crosses 2/3
    let mut harness = SwapHarness::with_validators(&[ALICE]);
    let locker = keypair(ALICE);
    let eth_txn = vec![0xf8, 0x01, 0x02];
    let lock = build_tx(
        &LockPayload {
            locker: locker.address(),
            tracker_name: hash(&eth_txn),
            eth_txn: eth_txn.clone(),
        },
        &locker,
    );
    harness.block(&[lock]);

    // the job broadcasts the raw transaction and reports finality
    harness.alice_jobs.run_pending().await;
    assert_eq!(*harness.eth.broadcasts.lock().unwrap(), vec![eth_txn.clone()]);
    let reports = harness.alice_submitter.drain();
    assert_eq!(reports.len(), 1);
    harness.block(&reports);

    let ctx = state_context(&harness.alice_app);
    let tracker = ctx.eth_trackers.get(&hash(&eth_txn)).unwrap().unwrap();
    assert_eq!(tracker.state, TrackerState::Finalized);
    assert_eq!(tracker.witnesses, vec![locker.address()]);
}

#[tokio::test]
async fn replayed_publish_is_a_no_op() {
    let mut harness = SwapHarness::new();
    let (alice_request, bob_request) = swap_requests();

    let alice_tx = build_tx(&alice_request, &keypair(ALICE));
    let bob_tx = build_tx(&bob_request, &keypair(BOB));
    harness.block(&[alice_tx, bob_tx]);

    harness.alice_jobs.run_pending().await;
    let publishes = harness.alice_submitter.drain();
    assert_eq!(publishes.len(), 1);
    harness.block(&publishes);
    assert_eq!(harness.stage(), SwapStage::ParticipantParticipate);

    // the same publish delivered again must not disturb the stage
    harness.block(&publishes);
    assert_eq!(harness.stage(), SwapStage::ParticipantParticipate);
}
