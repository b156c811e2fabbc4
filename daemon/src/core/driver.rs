use olt_common::{
    crypto::{Address, PublicKey},
    genesis::GenesisState,
};
use serde::{Deserialize, Serialize};

// Consensus driver surface, ABCI-shaped
// Transactions arrive as length-prefixed byte strings; everything else is
// JSON over the same framing

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub chain_id: String,
    pub height: u64,
    // Block time as a unix timestamp in seconds
    pub time: u64,
    #[serde(with = "hex::serde", default)]
    pub app_hash: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RequestInitChain {
    pub genesis: GenesisState,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RequestBeginBlock {
    pub header: Header,
    // Validators that signed the previous block
    #[serde(default)]
    pub signers: Vec<Address>,
    // Validators with byzantine evidence in this block
    #[serde(default)]
    pub byzantine: Vec<Address>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RequestEndBlock {
    pub height: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub pubkey: PublicKey,
    // Zero removes the validator from the consensus set
    pub power: i64,
}

// Driver-surface exit codes: 0 accepts, anything else rejects
pub const CODE_OK: u32 = 0;
pub const CODE_NOT_OK: u32 = 1;

pub fn code_of(ok: bool) -> u32 {
    if ok {
        CODE_OK
    } else {
        CODE_NOT_OK
    }
}

// Emitted (key, value) pair indexed by the driver
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseCheckTx {
    pub code: u32,
    #[serde(with = "hex::serde", default)]
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseDeliverTx {
    pub code: u32,
    #[serde(with = "hex::serde", default)]
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseInitChain {
    #[serde(default)]
    pub validators: Vec<ValidatorUpdate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseEndBlock {
    #[serde(default)]
    pub validator_updates: Vec<ValidatorUpdate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseCommit {
    #[serde(with = "hex::serde", default)]
    pub app_hash: Vec<u8>,
    pub version: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RequestQuery {
    // Exact store key, hex encoded
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseQuery {
    pub code: u32,
    #[serde(with = "hex::serde", default)]
    pub key: Vec<u8>,
    #[serde(with = "hex::serde", default)]
    pub value: Vec<u8>,
    pub height: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RequestSetOption {
    pub key: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseSetOption {
    pub code: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseInfo {
    pub data: String,
    pub version: String,
    pub last_block_height: u64,
    #[serde(with = "hex::serde", default)]
    pub last_block_app_hash: Vec<u8>,
}

// Framed requests served by the daemon's driver endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum DriverRequest {
    Info,
    SetOption(RequestSetOption),
    Query(RequestQuery),
    InitChain(RequestInitChain),
    BeginBlock(RequestBeginBlock),
    CheckTx {
        #[serde(with = "hex::serde")]
        tx: Vec<u8>,
    },
    DeliverTx {
        #[serde(with = "hex::serde")]
        tx: Vec<u8>,
    },
    EndBlock(RequestEndBlock),
    Commit,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum DriverResponse {
    Info(ResponseInfo),
    SetOption(ResponseSetOption),
    Query(ResponseQuery),
    InitChain(ResponseInitChain),
    BeginBlock {},
    CheckTx(ResponseCheckTx),
    DeliverTx(ResponseDeliverTx),
    EndBlock(ResponseEndBlock),
    Commit(ResponseCommit),
    Error { log: String },
}
