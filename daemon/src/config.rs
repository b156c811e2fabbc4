use crate::core::swap::chains::{BitcoinConfig, EthereumConfig};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(name = "olt_daemon", about = "OLT Network application daemon")]
pub struct NodeArgs {
    /// Data directory for the chain database
    #[arg(long, default_value = "olt-data")]
    pub data_dir: PathBuf,

    /// Address the consensus driver connects to
    #[arg(long, default_value = "127.0.0.1:26658")]
    pub driver_bind: String,

    /// Genesis file, applied once on an empty database
    #[arg(long, default_value = "genesis.json")]
    pub genesis: PathBuf,

    /// Optional node config with keys and external chain endpoints
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

// Node-local configuration: this node's swap identity plus the external
// chain endpoints, consumed as opaque capabilities
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NodeConfig {
    /// Hex seed of this node's account key; enables swap participation.
    #[serde(default)]
    pub account_seed: Option<String>,

    #[serde(default)]
    pub bitcoin: Option<BitcoinConfig>,

    #[serde(default)]
    pub ethereum: Option<EthereumConfig>,
}

impl NodeConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
