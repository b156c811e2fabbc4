use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};
use std::{
    borrow::Cow,
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

pub const ADDRESS_SIZE: usize = 20; // 20 bytes / 160 bits

// Fixed-length account identifier, derived from a public key
// as RIPEMD160(SHA256(pubkey))
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub const fn zero() -> Self {
        Address::new([0; ADDRESS_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError> {
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| ReaderError::InvalidSize)?;
        Ok(Address::new(bytes))
    }
}

impl FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| "Invalid address")?;
        Ok(Address::new(bytes))
    }
}

impl Serializer for Address {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Address::from_bytes(reader.read_bytes(ADDRESS_SIZE)?)
    }

    fn size(&self) -> usize {
        ADDRESS_SIZE
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", &self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex: Cow<'de, str> = Cow::deserialize(deserializer)?;
        Address::from_str(&hex).map_err(SerdeError::custom)
    }
}
