use super::{SignedTx, TxSignature};
use crate::{config::MAX_MEMO_SIZE, crypto::Address, currency::Coin, fees::FeeOption};
use crate::serializer::Serializer;
use thiserror::Error;

// Stateless validation failures, surfaced by every handler's Validate
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Wrong transaction type")]
    WrongTxType,

    #[error("Missing required data: {0}")]
    MissingData(&'static str),

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Invalid public key")]
    InvalidPubkey,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid chain ID: expected {expected}, got {got}")]
    InvalidChainId { expected: String, got: String },

    #[error("Signer {0} is not covered by any signature")]
    MissingSigner(Address),

    #[error("Fee below minimum: got {got}, expected at least {expected}")]
    FeeTooSmall { got: Coin, expected: Coin },

    #[error("Wrong fee currency: {0}")]
    WrongFeeCurrency(String),

    #[error("Memo too large")]
    MemoTooLarge,

    #[error("Currency not supported for swaps: {0}")]
    NotImplementedCurrency(String),
}

// Check that every declared signer has produced a valid signature over
// the raw transaction bytes
pub fn validate_basic(
    raw_bytes: &[u8],
    signers: &[Address],
    signatures: &[TxSignature],
) -> Result<(), VerificationError> {
    if signers.is_empty() {
        return Err(VerificationError::MissingData("signers"));
    }
    if signatures.is_empty() {
        return Err(VerificationError::MissingData("signatures"));
    }

    for signer in signers {
        let covered = signatures.iter().any(|sig| {
            sig.pubkey.to_address() == *signer && sig.pubkey.verify(raw_bytes, &sig.signature)
        });
        if !covered {
            return Err(VerificationError::MissingSigner(signer.clone()));
        }
    }
    Ok(())
}

// Check the declared fee against the configured minimum for this tx size
pub fn validate_fee(fee_opt: &FeeOption, tx: &SignedTx) -> Result<(), VerificationError> {
    if tx.raw.memo.len() > MAX_MEMO_SIZE {
        return Err(VerificationError::MemoTooLarge);
    }
    if tx.raw.fee.currency != fee_opt.fee_currency {
        return Err(VerificationError::WrongFeeCurrency(
            tx.raw.fee.currency.clone(),
        ));
    }
    let min = fee_opt.min_fee(tx.raw.size());
    if tx.raw.fee.value < min.value {
        return Err(VerificationError::FeeTooSmall {
            got: tx.raw.fee.clone(),
            expected: min,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::KeyPair,
        currency::Amount,
        serializer::Serializer,
        transaction::{RawTx, TxType},
    };

    fn signed(fee: u64) -> (SignedTx, KeyPair) {
        let pair = KeyPair::from_seed([5u8; 32]);
        let raw = RawTx {
            tx_type: TxType::Send,
            data: b"{}".to_vec(),
            fee: Coin::new("OLT", Amount::from_u64(fee)),
            memo: String::new(),
        };
        let mut tx = SignedTx {
            raw,
            signatures: Vec::new(),
        };
        tx.sign(&pair);
        (tx, pair)
    }

    #[test]
    fn basic_validation_accepts_signer() {
        let (tx, pair) = signed(1_000_000);
        validate_basic(&tx.raw_bytes(), &[pair.address()], &tx.signatures).unwrap();
    }

    #[test]
    fn basic_validation_rejects_other_signer() {
        let (tx, _) = signed(1_000_000);
        let other = KeyPair::from_seed([6u8; 32]).address();
        let err = validate_basic(&tx.raw_bytes(), &[other.clone()], &tx.signatures).unwrap_err();
        assert_eq!(err, VerificationError::MissingSigner(other));
    }

    #[test]
    fn fee_below_minimum_is_rejected() {
        let (tx, _) = signed(1);
        let err = validate_fee(&FeeOption::default(), &tx).unwrap_err();
        assert!(matches!(err, VerificationError::FeeTooSmall { .. }));
    }

    #[test]
    fn sufficient_fee_passes() {
        let (tx, _) = signed(1_000_000);
        assert!(tx.raw.size() <= 1_000_000);
        validate_fee(&FeeOption::default(), &tx).unwrap();
    }
}
