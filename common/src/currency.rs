use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use indexmap::IndexMap;
use primitive_types::U256;
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};
use std::{
    borrow::Cow,
    fmt::{Display, Error, Formatter},
    ops::{Add, Sub},
    str::FromStr,
};

// Which chain a currency lives on natively
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    Olt,
    Bitcoin,
    Ethereum,
}

impl Serializer for ChainKind {
    fn write(&self, writer: &mut Writer) {
        let v = match self {
            ChainKind::Olt => 0u8,
            ChainKind::Bitcoin => 1u8,
            ChainKind::Ethereum => 2u8,
        };
        writer.write_u8(v);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(ChainKind::Olt),
            1 => Ok(ChainKind::Bitcoin),
            2 => Ok(ChainKind::Ethereum),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn size(&self) -> usize {
        1
    }
}

// A registered currency
// The id gives currencies a total order; the swap coordinator uses it to
// pick the initiator side deterministically
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Currency {
    pub id: u32,
    pub name: String,
    pub chain: ChainKind,
    pub decimals: u8,
}

// Registry of the currencies known to the chain, loaded at genesis
#[derive(Clone, Debug, Default)]
pub struct CurrencySet {
    currencies: IndexMap<String, Currency>,
}

impl CurrencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, currency: Currency) {
        log::debug!("registered currency {} (id {})", currency.name, currency.id);
        self.currencies.insert(currency.name.clone(), currency);
    }

    pub fn get_currency_by_name(&self, name: &str) -> Option<&Currency> {
        self.currencies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.currencies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }
}

// Arbitrary-precision amount in atomic units
// JSON representation is a decimal string, the wire representation is
// 32 big-endian bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(U256);

impl Amount {
    pub const fn zero() -> Self {
        Amount(U256::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Amount(U256::from(value))
    }

    pub fn inner(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul_u64(&self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(U256::from(factor)).map(Amount)
    }

    // Saturating conversion to the integer voting power scale
    pub fn as_power(&self) -> i64 {
        if self.0 > U256::from(i64::MAX as u64) {
            i64::MAX
        } else {
            self.0.as_u64() as i64
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl FromStr for Amount {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s).map(Amount).map_err(|_| "Invalid amount")
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value: Cow<'de, str> = Cow::deserialize(deserializer)?;
        Amount::from_str(&value).map_err(SerdeError::custom)
    }
}

impl Serializer for Amount {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0.to_big_endian());
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Amount(U256::from_big_endian(&reader.read_bytes_32()?)))
    }

    fn size(&self) -> usize {
        32
    }
}

// A (currency, amount) pair
// The currency is referenced by name and resolved against the registry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub currency: String,
    pub value: Amount,
}

impl Coin {
    pub fn new(currency: &str, value: Amount) -> Self {
        Self {
            currency: currency.to_string(),
            value,
        }
    }

    pub fn is_currency(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.currency == *name)
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{} {}", self.value, self.currency)
    }
}

impl Serializer for Coin {
    fn write(&self, writer: &mut Writer) {
        self.currency.write(writer);
        self.value.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let currency = String::read(reader)?;
        let value = Amount::read(reader)?;
        Ok(Self { currency, value })
    }

    fn size(&self) -> usize {
        self.currency.size() + self.value.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_decimal_roundtrip() {
        let amount = Amount::from_u64(1_000_000_007);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000007\"");
        let decoded: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, decoded);
    }

    #[test]
    fn amount_checked_sub_underflow() {
        let small = Amount::from_u64(1);
        let big = Amount::from_u64(2);
        assert!(small.checked_sub(&big).is_none());
    }

    #[test]
    fn currency_set_lookup() {
        let mut set = CurrencySet::new();
        set.register(Currency {
            id: 0,
            name: "OLT".to_string(),
            chain: ChainKind::Olt,
            decimals: 8,
        });
        assert!(set.contains("OLT"));
        assert!(!set.contains("BTC"));
        assert_eq!(set.get_currency_by_name("OLT").unwrap().id, 0);
    }
}
