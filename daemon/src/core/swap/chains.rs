use async_trait::async_trait;
use olt_common::{
    crypto::Hash,
    currency::{Amount, ChainKind},
    swap::HtlcContract,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("RPC failure: {0}")]
    Rpc(String),

    #[error("Contract not found on chain")]
    ContractNotFound,

    #[error("Contract not redeemed yet")]
    NotRedeemed,

    #[error("Contract timeout has not passed")]
    TimeoutNotReached,

    #[error("Rejected by chain: {0}")]
    Rejected(String),
}

// What an audit of an on-chain HTLC reveals
#[derive(Clone, Debug)]
pub struct HtlcAudit {
    pub receiver: Vec<u8>,
    pub value: Amount,
    pub secret_hash: Hash,
    pub timeout: u64,
}

// Capability over one external chain's HTLC facility
// Native clients (BTC RPC, Ethereum JSON-RPC) implement this; the core
// never talks to a chain except through it
#[async_trait]
pub trait HtlcChain: Send + Sync {
    fn kind(&self) -> ChainKind;

    // Publish a new HTLC and return its replicated record
    async fn initiate(
        &self,
        receiver: &[u8],
        value: &Amount,
        secret_hash: &Hash,
        timeout: u64,
    ) -> Result<HtlcContract, ChainClientError>;

    // Inspect an on-chain HTLC
    async fn audit(&self, contract: &HtlcContract) -> Result<HtlcAudit, ChainClientError>;

    // Claim with the secret; publishes the secret on this chain
    async fn redeem(&self, contract: &HtlcContract, secret: [u8; 32])
        -> Result<(), ChainClientError>;

    // Reclaim after the timeout has passed
    async fn refund(&self, contract: &HtlcContract) -> Result<(), ChainClientError>;

    // Read the secret a redeem has revealed
    async fn extract_secret(
        &self,
        contract: &HtlcContract,
        secret_hash: &Hash,
    ) -> Result<[u8; 32], ChainClientError>;

    // Broadcast a raw signed transaction (tracker jobs)
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), ChainClientError>;
}

// The chain capabilities a node was configured with
#[derive(Clone, Default)]
pub struct ChainRegistry {
    bitcoin: Option<Arc<dyn HtlcChain>>,
    ethereum: Option<Arc<dyn HtlcChain>>,
}

impl ChainRegistry {
    pub fn new(
        bitcoin: Option<Arc<dyn HtlcChain>>,
        ethereum: Option<Arc<dyn HtlcChain>>,
    ) -> Self {
        Self { bitcoin, ethereum }
    }

    pub fn get(&self, chain: ChainKind) -> Option<&Arc<dyn HtlcChain>> {
        match chain {
            ChainKind::Bitcoin => self.bitcoin.as_ref(),
            ChainKind::Ethereum => self.ethereum.as_ref(),
            ChainKind::Olt => None,
        }
    }
}

// ===== External chain endpoint configuration =====

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum BtcNetwork {
    Mainnet,
    Testnet3,
    Regtest,
    Simnet,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BitcoinConfig {
    pub node_address: String,
    pub rpc_port: u16,
    pub rpc_username: String,
    pub rpc_password: String,
    pub network: BtcNetwork,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EthereumConfig {
    pub endpoint: String,
    pub contract_address: String,
    pub contract_abi: String,
}
