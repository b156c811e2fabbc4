use crate::{
    config::NATIVE_CURRENCY,
    currency::{Amount, Coin},
};
use serde::{Deserialize, Serialize};

// Fee policy loaded from genesis
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FeeOption {
    // Fee currency, OLT on every network so far
    pub fee_currency: String,
    // Minimum fee per transaction byte in atomic units
    pub min_fee_per_byte: Amount,
}

impl FeeOption {
    // Minimum acceptable fee for a transaction of the given size
    pub fn min_fee(&self, tx_size: usize) -> Coin {
        let value = self
            .min_fee_per_byte
            .checked_mul_u64(tx_size as u64)
            .unwrap_or(self.min_fee_per_byte);
        Coin::new(&self.fee_currency, value)
    }
}

impl Default for FeeOption {
    fn default() -> Self {
        Self {
            fee_currency: NATIVE_CURRENCY.to_string(),
            min_fee_per_byte: Amount::from_u64(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_fee_scales_with_size() {
        let opt = FeeOption::default();
        assert_eq!(opt.min_fee(100).value, Amount::from_u64(100));
        assert_eq!(opt.min_fee(100).currency, "OLT");
    }
}
