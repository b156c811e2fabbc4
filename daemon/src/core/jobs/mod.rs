use crate::core::{
    error::ChainError,
    storage::ChainState,
    stores::TrackerStore,
    swap::{chains::ChainRegistry, executor::SwapExecutor},
};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use olt_common::{
    crypto::{Hash, KeyPair},
    currency::ChainKind,
    fees::FeeOption,
    swap::SwapStage,
    transaction::{payload::ReportFinalityPayload, SignedTx, TransactionBuilder},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

const JOB_PREFIX: &[u8] = b"job/";
const JOB_SEQ_KEY: &[u8] = b"job!seq";

// Work the deliver path schedules for off-chain execution
// Jobs produce transactions that re-enter the pipeline; they never write
// replicated state directly
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    SwapStage { swap_id: Hash, stage: SwapStage },
    BroadcastTracker { chain: ChainKind, name: Hash },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct JobRecord {
    job: Job,
    done: bool,
}

// Append-only node-local job queue, drained by the executor
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<ChainState>,
}

impl JobStore {
    pub fn new(backend: Arc<ChainState>) -> Self {
        Self { backend }
    }

    fn key(id: u64) -> Vec<u8> {
        let mut key = JOB_PREFIX.to_vec();
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn next_id(&self) -> Result<u64, ChainError> {
        let next = match self.backend.local_get(JOB_SEQ_KEY)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().unwrap_or_default();
                u64::from_be_bytes(bytes) + 1
            }
            None => 1,
        };
        self.backend.local_set(JOB_SEQ_KEY, &next.to_be_bytes())?;
        Ok(next)
    }

    pub fn enqueue(&self, job: &Job) -> Result<u64, ChainError> {
        let id = self.next_id()?;
        let record = JobRecord {
            job: job.clone(),
            done: false,
        };
        let bytes = serde_json::to_vec(&record).map_err(ChainError::Serialization)?;
        self.backend.local_set(&Self::key(id), &bytes)?;
        debug!("job {} queued: {:?}", id, job);
        Ok(id)
    }

    // All jobs not yet marked done, in enqueue order
    pub fn pending(&self) -> Result<Vec<(u64, Job)>, ChainError> {
        let mut pending = Vec::new();
        for (key, value) in self.backend.local_iterate_prefix(JOB_PREFIX)? {
            let record: JobRecord =
                serde_json::from_slice(&value).map_err(ChainError::Deserialization)?;
            if record.done {
                continue;
            }
            let id_bytes: [u8; 8] = key[JOB_PREFIX.len()..]
                .try_into()
                .unwrap_or_default();
            pending.push((u64::from_be_bytes(id_bytes), record.job));
        }
        Ok(pending)
    }

    pub fn mark_done(&self, id: u64) -> Result<(), ChainError> {
        if let Some(bytes) = self.backend.local_get(&Self::key(id))? {
            let mut record: JobRecord =
                serde_json::from_slice(&bytes).map_err(ChainError::Deserialization)?;
            record.done = true;
            let bytes = serde_json::to_vec(&record).map_err(ChainError::Serialization)?;
            self.backend.local_set(&Self::key(id), &bytes)?;
        }
        Ok(())
    }
}

// Where finished jobs send their result transactions
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn submit(&self, tx: SignedTx) -> anyhow::Result<()>;
}

// Drains the job queue between blocks and turns external chain work into
// result transactions
pub struct JobExecutor {
    jobs: JobStore,
    swaps: SwapExecutor,
    chains: ChainRegistry,
    backend: Arc<ChainState>,
    submitter: Arc<dyn TxSubmitter>,
    node: Arc<KeyPair>,
    fee_opt: FeeOption,
}

impl JobExecutor {
    pub fn new(
        jobs: JobStore,
        swaps: SwapExecutor,
        chains: ChainRegistry,
        backend: Arc<ChainState>,
        submitter: Arc<dyn TxSubmitter>,
        node: Arc<KeyPair>,
        fee_opt: FeeOption,
    ) -> Self {
        Self {
            jobs,
            swaps,
            chains,
            backend,
            submitter,
            node,
            fee_opt,
        }
    }

    pub fn swap_executor(&self) -> &SwapExecutor {
        &self.swaps
    }

    // One pass over the queue; failed jobs stay pending for the next pass
    pub async fn run_pending(&self) {
        let pending = match self.jobs.pending() {
            Ok(pending) => pending,
            Err(err) => {
                error!("failed to read job queue: {}", err);
                return;
            }
        };

        for (id, job) in pending {
            let result = match &job {
                Job::SwapStage { swap_id, stage } => {
                    self.swaps.run_stage(swap_id, *stage).await.map_err(|err| {
                        warn!("swap stage job {} failed: {}", id, err);
                    })
                }
                Job::BroadcastTracker { chain, name } => {
                    self.broadcast_tracker(*chain, name).await.map_err(|_| {
                        warn!("tracker broadcast job {} failed", id);
                    })
                }
            };
            if result.is_ok() {
                if let Err(err) = self.jobs.mark_done(id) {
                    error!("failed to mark job {} done: {}", id, err);
                }
            }
        }
    }

    // Broadcast the tracker's raw transaction and witness it
    async fn broadcast_tracker(&self, chain: ChainKind, name: &Hash) -> Result<(), ()> {
        let client = self.chains.get(chain).ok_or(())?;

        let state = crate::core::storage::State::shared(self.backend.clone());
        let store = match chain {
            ChainKind::Bitcoin => TrackerStore::new_btc(state),
            ChainKind::Ethereum => TrackerStore::new_eth(state),
            ChainKind::Olt => return Err(()),
        };
        let tracker = store
            .get(name)
            .map_err(|err| error!("tracker lookup failed: {}", err))?
            .ok_or(())?;

        client
            .broadcast(&tracker.signed_tx)
            .await
            .map_err(|err| warn!("broadcast of tracker {} failed: {}", name, err))?;
        info!("tracker {} broadcast on {}", name, chain);

        // this validator has now observed the transaction; attest
        let report = ReportFinalityPayload {
            validator: self.node.address(),
            tracker_name: tracker.name.clone(),
            chain,
            success: true,
        };
        let tx = TransactionBuilder::new(self.fee_opt.clone()).build(&report, &self.node);
        self.submitter
            .submit(tx)
            .await
            .map_err(|err| warn!("failed to submit finality report: {}", err))?;
        Ok(())
    }

    // Periodic loop: drain jobs, then look for refundable swaps
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.run_pending().await;
            self.swaps.check_refunds().await;
            self.swaps.cleanup_finished();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_preserves_order_and_done_flags() {
        let backend = ChainState::in_memory().unwrap();
        let store = JobStore::new(backend);

        let first = store
            .enqueue(&Job::BroadcastTracker {
                chain: ChainKind::Ethereum,
                name: Hash::zero(),
            })
            .unwrap();
        let second = store
            .enqueue(&Job::SwapStage {
                swap_id: Hash::max(),
                stage: SwapStage::InitiatorInitiate,
            })
            .unwrap();

        let pending = store.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].0, first);
        assert_eq!(pending[1].0, second);

        store.mark_done(first).unwrap();
        let pending = store.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, second);
    }
}
