use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use olt_common::{crypto::KeyPair, genesis::GenesisState};
use olt_daemon::{
    config::{NodeArgs, NodeConfig},
    core::{
        app::Application,
        driver::RequestInitChain,
        jobs::{JobExecutor, JobStore, TxSubmitter},
        storage::ChainState,
        swap::{
            chains::ChainRegistry,
            executor::{SwapExecutor, SystemClock},
        },
    },
    rpc::DriverServer,
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::sync::Mutex;

const JOB_INTERVAL: Duration = Duration::from_secs(5);

fn setup_logger(level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let colors = fern::colors::ColoredLevelConfig::default();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                unix_timestamp(),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context("failed to initialize logging")
}

// Seconds since the epoch; enough resolution for daemon logs
fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

// Loopback submitter: result transactions from background jobs go
// straight into this node's mempool surface (CheckTx); the driver picks
// them up from there
struct LoopbackSubmitter {
    app: Arc<Mutex<Application>>,
}

#[async_trait::async_trait]
impl TxSubmitter for LoopbackSubmitter {
    async fn submit(&self, tx: olt_common::transaction::SignedTx) -> Result<()> {
        use olt_common::serializer::Serializer;
        let app = self.app.lock().await;
        let response = app.check_tx(&tx.to_bytes());
        if response.code != 0 {
            anyhow::bail!("submitted tx rejected: {}", response.log);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = NodeArgs::parse();
    setup_logger(&args.log_level)?;

    let node_config = match &args.config {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            NodeConfig::from_json(&bytes).context("malformed node config")?
        }
        None => NodeConfig::default(),
    };

    let backend = ChainState::open(&args.data_dir)
        .map_err(|err| anyhow::anyhow!("failed to open chain database: {}", err))?;

    let node_pair = match &node_config.account_seed {
        Some(seed_hex) => {
            let seed: [u8; 32] = hex::decode(seed_hex)
                .ok()
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or_else(|| anyhow::anyhow!("account seed must be 32 hex bytes"))?;
            Some(Arc::new(KeyPair::from_seed(seed)))
        }
        None => None,
    };

    let mut app = Application::new(backend.clone())
        .map_err(|err| anyhow::anyhow!("failed to build application: {}", err))?;
    if let Some(pair) = &node_pair {
        app = app.with_node_account(pair.address());
        info!("node account is {}", pair.address());
    }

    // apply genesis exactly once, on an empty database
    if backend.version().map_err(to_anyhow)? == 0 {
        let bytes = std::fs::read(&args.genesis)
            .with_context(|| format!("failed to read genesis {}", args.genesis.display()))?;
        let genesis = GenesisState::from_json(&bytes).context("malformed genesis file")?;
        let response = app
            .init_chain(RequestInitChain { genesis })
            .map_err(to_anyhow)?;
        info!(
            "genesis applied, initial validator set has {} members",
            response.validators.len()
        );
    }

    let fee_opt = app.fee_option().clone();
    let currencies = app.currencies().clone();
    let app = Arc::new(Mutex::new(app));

    // background jobs only run for a configured node identity
    if let Some(pair) = node_pair {
        let chains = ChainRegistry::new(None, None);
        if node_config.bitcoin.is_some() || node_config.ethereum.is_some() {
            // native chain clients are provided by the embedding
            // integration; endpoints alone do not construct one
            warn!("external chain endpoints configured but no native client linked in");
        }
        let submitter = Arc::new(LoopbackSubmitter { app: app.clone() });
        let swaps = SwapExecutor::new(
            backend.clone(),
            chains.clone(),
            currencies,
            submitter.clone(),
            pair.clone(),
            fee_opt.clone(),
            Arc::new(SystemClock),
        );
        let executor = JobExecutor::new(
            JobStore::new(backend.clone()),
            swaps,
            chains,
            backend.clone(),
            submitter,
            pair,
            fee_opt,
        );
        tokio::spawn(executor.run(JOB_INTERVAL));
    }

    DriverServer::new(app).serve(&args.driver_bind).await
}

fn to_anyhow(err: olt_daemon::core::error::ChainError) -> anyhow::Error {
    anyhow::anyhow!("{}", err)
}
