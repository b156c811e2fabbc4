use crate::{
    config::{NATIVE_CURRENCY, STAKE_CURRENCY},
    crypto::{Address, EcdsaPubKey, PublicKey},
    currency::{Amount, ChainKind, Coin, Currency},
    fees::FeeOption,
    governance::{ProposalOption, ProposalType},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GenesisBalance {
    pub address: Address,
    pub coins: Vec<Coin>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GenesisValidator {
    pub address: Address,
    pub stake_address: Address,
    pub pubkey: PublicKey,
    #[serde(default)]
    pub ecdsa_pubkey: EcdsaPubKey,
    pub name: String,
    /// Initial stake in VT atomic units.
    pub staked: Amount,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GovernanceOptions {
    pub config_update: ProposalOption,
    pub code_change: ProposalOption,
    pub general: ProposalOption,
}

impl GovernanceOptions {
    pub fn get(&self, proposal_type: ProposalType) -> &ProposalOption {
        match proposal_type {
            ProposalType::ConfigUpdate => &self.config_update,
            ProposalType::CodeChange => &self.code_change,
            ProposalType::General => &self.general,
        }
    }

    // A proposal that reaches Voting must keep its voting deadline past
    // its funding deadline; validated once at load time
    pub fn validate(&self) -> Result<(), String> {
        for (name, opt) in [
            ("config_update", &self.config_update),
            ("code_change", &self.code_change),
            ("general", &self.general),
        ] {
            if opt.voting_deadline_blocks <= opt.funding_deadline_blocks {
                return Err(format!(
                    "proposal option {}: voting deadline ({}) must exceed funding deadline ({})",
                    name, opt.voting_deadline_blocks, opt.funding_deadline_blocks
                ));
            }
            if !(0..=100).contains(&opt.pass_percent) {
                return Err(format!(
                    "proposal option {}: pass percent {} out of range",
                    name, opt.pass_percent
                ));
            }
        }
        Ok(())
    }
}

impl Default for GovernanceOptions {
    fn default() -> Self {
        Self {
            config_update: ProposalOption::default(),
            code_change: ProposalOption::default(),
            general: ProposalOption::default(),
        }
    }
}

// The application state seeded at InitChain
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GenesisState {
    pub chain_id: String,
    pub currencies: Vec<Currency>,
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde(default)]
    pub fee_option: FeeOption,
    #[serde(default)]
    pub governance: GovernanceOptions,
}

impl GenesisState {
    // A minimal development genesis with the four standard currencies
    pub fn dev(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            currencies: default_currencies(),
            balances: Vec::new(),
            validators: Vec::new(),
            fee_option: FeeOption::default(),
            governance: GovernanceOptions::default(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

lazy_static::lazy_static! {
    // The standard currency table every network starts from
    static ref DEFAULT_CURRENCIES: Vec<Currency> = vec![
        Currency {
            id: 0,
            name: NATIVE_CURRENCY.to_string(),
            chain: ChainKind::Olt,
            decimals: 8,
        },
        Currency {
            id: 1,
            name: "BTC".to_string(),
            chain: ChainKind::Bitcoin,
            decimals: 8,
        },
        Currency {
            id: 2,
            name: "ETH".to_string(),
            chain: ChainKind::Ethereum,
            decimals: 18,
        },
        Currency {
            id: 3,
            name: STAKE_CURRENCY.to_string(),
            chain: ChainKind::Olt,
            decimals: 8,
        },
    ];
}

pub fn default_currencies() -> Vec<Currency> {
    DEFAULT_CURRENCIES.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_genesis_has_native_currencies() {
        let genesis = GenesisState::dev("olt-dev");
        let names: Vec<&str> = genesis.currencies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["OLT", "BTC", "ETH", "VT"]);
        genesis.governance.validate().unwrap();
    }

    #[test]
    fn misconfigured_deadlines_are_rejected() {
        let mut genesis = GenesisState::dev("olt-dev");
        genesis.governance.general.voting_deadline_blocks = 1;
        genesis.governance.general.funding_deadline_blocks = 2;
        assert!(genesis.governance.validate().is_err());
    }

    #[test]
    fn genesis_json_roundtrip() {
        let genesis = GenesisState::dev("olt-dev");
        let json = serde_json::to_vec(&genesis).unwrap();
        let decoded = GenesisState::from_json(&json).unwrap();
        assert_eq!(decoded.chain_id, "olt-dev");
        assert_eq!(decoded.currencies.len(), 4);
    }
}
