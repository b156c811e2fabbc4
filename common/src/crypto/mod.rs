mod address;
mod hash;
mod keys;

pub use address::{Address, ADDRESS_SIZE};
pub use hash::{hash, ripemd160, Hash, HASH_SIZE};
pub use keys::{EcdsaPubKey, KeyPair, PublicKey, Signature, SIGNATURE_SIZE};
