use crate::{
    crypto::{hash, Address, Hash, KeyPair, PublicKey, Signature},
    currency::Coin,
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod payload;
pub mod verify;

pub use builder::TransactionBuilder;

// All transaction types understood by the router
// The discriminant is the wire tag of the Data union
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum TxType {
    Send = 0,
    ApplyValidator = 1,
    Swap = 2,
    Publish = 3,
    EthLock = 4,
    ReportFinality = 5,
    ProposalCreate = 32,
    ProposalFund = 33,
    ProposalVote = 34,
}

impl TxType {
    pub fn from_u32(value: u32) -> Option<TxType> {
        Some(match value {
            0 => TxType::Send,
            1 => TxType::ApplyValidator,
            2 => TxType::Swap,
            3 => TxType::Publish,
            4 => TxType::EthLock,
            5 => TxType::ReportFinality,
            32 => TxType::ProposalCreate,
            33 => TxType::ProposalFund,
            34 => TxType::ProposalVote,
            _ => return None,
        })
    }
}

impl Serializer for TxType {
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&(*self as u32));
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        TxType::from_u32(reader.read_u32()?).ok_or(ReaderError::InvalidValue)
    }

    fn size(&self) -> usize {
        4
    }
}

// The signed portion of a transaction
// The payload bytes decode per tx_type as JSON
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RawTx {
    pub tx_type: TxType,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    pub fee: Coin,
    pub memo: String,
}

impl RawTx {
    // Canonical bytes covered by every signature
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }

    pub fn hash(&self) -> Hash {
        hash(&self.raw_bytes())
    }

    // Decode the JSON payload for this transaction type
    pub fn decode_payload<'a, P: Deserialize<'a>>(&'a self) -> Result<P, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

impl Serializer for RawTx {
    fn write(&self, writer: &mut Writer) {
        self.tx_type.write(writer);
        self.data.write(writer);
        self.fee.write(writer);
        self.memo.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let tx_type = TxType::read(reader)?;
        let data = Vec::read(reader)?;
        let fee = Coin::read(reader)?;
        let memo = String::read(reader)?;
        Ok(Self {
            tx_type,
            data,
            fee,
            memo,
        })
    }

    fn size(&self) -> usize {
        self.tx_type.size() + self.data.size() + self.fee.size() + self.memo.size()
    }
}

// One signature over the raw transaction bytes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxSignature {
    pub pubkey: PublicKey,
    pub signature: Signature,
}

impl Serializer for TxSignature {
    fn write(&self, writer: &mut Writer) {
        self.pubkey.write(writer);
        self.signature.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let pubkey = PublicKey::read(reader)?;
        let signature = Signature::read(reader)?;
        Ok(Self { pubkey, signature })
    }

    fn size(&self) -> usize {
        self.pubkey.size() + self.signature.size()
    }
}

// The transaction envelope as delivered by the consensus driver
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: RawTx,
    pub signatures: Vec<TxSignature>,
}

impl SignedTx {
    pub fn tx_type(&self) -> TxType {
        self.raw.tx_type
    }

    pub fn raw_bytes(&self) -> Vec<u8> {
        self.raw.raw_bytes()
    }

    pub fn hash(&self) -> Hash {
        self.raw.hash()
    }

    // Sign with an additional key
    pub fn sign(&mut self, pair: &KeyPair) {
        let signature = pair.sign(&self.raw_bytes());
        self.signatures.push(TxSignature {
            pubkey: pair.public_key(),
            signature,
        });
    }

    // Addresses of all attached signatures
    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signatures
            .iter()
            .map(|s| s.pubkey.to_address())
            .collect()
    }
}

impl Serializer for SignedTx {
    fn write(&self, writer: &mut Writer) {
        self.raw.write(writer);
        self.signatures.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let raw = RawTx::read(reader)?;
        let signatures = Vec::read(reader)?;
        Ok(Self { raw, signatures })
    }

    fn size(&self) -> usize {
        self.raw.size() + self.signatures.size()
    }
}
