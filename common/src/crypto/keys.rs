use super::{hash, ripemd160, Address};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};
use std::{
    borrow::Cow,
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

// Ed25519 public key, used for envelope signatures and consensus identity
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub const fn new(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError> {
        let bytes: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| ReaderError::InvalidSize)?;
        Ok(PublicKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    // Account address of this key: RIPEMD160(SHA256(pubkey))
    pub fn to_address(&self) -> Address {
        Address::new(ripemd160(hash(&self.0).as_bytes()))
    }

    // Verify an Ed25519 signature over a message
    // Returns false for malformed keys as well, so callers have a single check
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl Serializer for PublicKey {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(PublicKey(reader.read_bytes_32()?))
    }

    fn size(&self) -> usize {
        PUBLIC_KEY_SIZE
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex: Cow<'de, str> = Cow::deserialize(deserializer)?;
        let bytes = hex::decode(hex.as_ref()).map_err(SerdeError::custom)?;
        PublicKey::from_bytes(&bytes).map_err(SerdeError::custom)
    }
}

// Detached Ed25519 signature
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Signature {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
        let bytes: [u8; SIGNATURE_SIZE] = bytes.try_into().map_err(|_| "Invalid signature")?;
        Ok(Signature(bytes))
    }
}

impl Serializer for Signature {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes(SIGNATURE_SIZE)?;
        Ok(Signature(
            bytes.try_into().map_err(|_| ReaderError::InvalidSize)?,
        ))
    }

    fn size(&self) -> usize {
        SIGNATURE_SIZE
    }
}

impl Serialize for Signature {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex: Cow<'de, str> = Cow::deserialize(deserializer)?;
        Signature::from_str(&hex).map_err(SerdeError::custom)
    }
}

// Opaque secp256k1 public key bytes, carried for external chain identity
// and never verified locally
#[derive(Eq, PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct EcdsaPubKey(#[serde(with = "hex::serde")] pub Vec<u8>);

impl Serializer for EcdsaPubKey {
    fn write(&self, writer: &mut Writer) {
        self.0.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(EcdsaPubKey(Vec::read(reader)?))
    }

    fn size(&self) -> usize {
        self.0.size()
    }
}

// Signing key pair used by the transaction builder and by node identities
pub struct KeyPair {
    secret: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            secret: SigningKey::generate(&mut rng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.secret.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.secret.sign(message).to_bytes())
    }
}
