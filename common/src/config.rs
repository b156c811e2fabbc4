// Name of the native fee / governance currency
pub const NATIVE_CURRENCY: &str = "OLT";
// Name of the validator stake currency
pub const STAKE_CURRENCY: &str = "VT";

// 8 decimals numbers
pub const COIN_DECIMALS: u8 = 8;
// 100 000 000 to represent 1 OLT
pub const COIN_VALUE: u64 = 10u64.pow(COIN_DECIMALS as u32);

// Base HTLC lock period in seconds
// The participant locks for one period, the initiator for two,
// so the participant side always expires first
pub const LOCK_PERIOD_SECS: u64 = 5 * 60;

// Size of an HTLC secret and of its SHA-256 hash
pub const SECRET_SIZE: usize = 32;

// Max transaction size in bytes accepted on the driver surface
pub const MAX_TRANSACTION_SIZE: usize = 1024 * 1024;
// Max memo size in bytes
pub const MAX_MEMO_SIZE: usize = 256;

// Witness power threshold for tracker finalization, expressed as a ratio
// A tracker finalizes once witness_power * WITNESS_RATIO_DEN >= total_power * WITNESS_RATIO_NUM
pub const WITNESS_RATIO_NUM: u64 = 2;
pub const WITNESS_RATIO_DEN: u64 = 3;
