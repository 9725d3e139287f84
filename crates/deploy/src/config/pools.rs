use std::{collections::HashSet, path::Path, str::FromStr};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{DeployError, Result, config::TokenConfig};

/// Fully resolved parameters of one staking pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub token_address: Address,
    pub name: String,
    pub min_stake_amount: u64,
    pub max_stake_amount: u64,
    /// Seconds between an unstake request and the withdrawal.
    pub cool_off: u64,
    /// Seconds between two reward redemptions.
    pub redeem_interval: u64,
    pub max_pool_amount: u64,
    pub interest_precision: u64,
    /// Annual interest, in percent.
    pub interest: u64,
    pub decimals: u64,
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DeployError::config("pool name must not be empty"));
        }
        if self.min_stake_amount > self.max_stake_amount {
            return Err(DeployError::config(format!(
                "pool {}: min_stake_amount {} exceeds max_stake_amount {}",
                self.name, self.min_stake_amount, self.max_stake_amount
            )));
        }
        if self.max_stake_amount > self.max_pool_amount {
            return Err(DeployError::config(format!(
                "pool {}: max_stake_amount {} exceeds max_pool_amount {}",
                self.name, self.max_stake_amount, self.max_pool_amount
            )));
        }
        if self.interest_precision == 0 {
            return Err(DeployError::config(format!(
                "pool {}: interest_precision must be non-zero",
                self.name
            )));
        }
        Ok(())
    }
}

/// Token of a pool: a symbol looked up in the token config, or a literal address.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TokenRef {
    Address(Address),
    Symbol(String),
}

impl FromStr for TokenRef {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with("0x") {
            let address = s
                .parse::<Address>()
                .map_err(|e| DeployError::config(format!("invalid token address {s}: {e}")))?;
            return Ok(Self::Address(address));
        }
        if s.is_empty() {
            return Err(DeployError::config("token must not be empty"));
        }
        Ok(Self::Symbol(s.to_string()))
    }
}

impl TryFrom<String> for TokenRef {
    type Error = DeployError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TokenRef> for String {
    fn from(value: TokenRef) -> Self {
        value.to_string()
    }
}

impl TokenRef {
    pub fn resolve(&self, tokens: &TokenConfig) -> Result<Address> {
        match self {
            Self::Address(address) => Ok(*address),
            Self::Symbol(symbol) => tokens.address(symbol),
        }
    }
}

/// One `[[pools]]` entry of a pool list file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub token: TokenRef,
    pub name: String,
    pub min_stake_amount: u64,
    pub max_stake_amount: u64,
    pub cool_off: u64,
    pub redeem_interval: u64,
    pub max_pool_amount: u64,
    pub interest_precision: u64,
    pub interest: u64,
    pub decimals: u64,
}

impl PoolSpec {
    pub fn resolve(&self, tokens: &TokenConfig) -> Result<PoolConfig> {
        let pool = PoolConfig {
            token_address: self.token.resolve(tokens)?,
            name: self.name.clone(),
            min_stake_amount: self.min_stake_amount,
            max_stake_amount: self.max_stake_amount,
            cool_off: self.cool_off,
            redeem_interval: self.redeem_interval,
            max_pool_amount: self.max_pool_amount,
            interest_precision: self.interest_precision,
            interest: self.interest,
            decimals: self.decimals,
        };
        pool.validate()?;
        Ok(pool)
    }
}

/// Ordered list of pools to deploy, read from a TOML file.
///
/// ```toml
/// [[pools]]
/// token = "XDC"
/// name = "XDC Premium Pool"
/// min_stake_amount = 10000
/// # ...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolList {
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

impl PoolList {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::config(format!("failed to read pool list {}: {e}", path.display()))
        })?;
        let list: Self = toml::from_str(&content).map_err(|e| {
            DeployError::config(format!("malformed pool list {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), pools = list.pools.len(), "Pool list loaded");
        Ok(list)
    }

    /// Resolve every entry against `tokens`, preserving order.
    ///
    /// Fails on the first invalid entry, or when two pools share a name.
    pub fn resolve(&self, tokens: &TokenConfig) -> Result<Vec<PoolConfig>> {
        let mut names = HashSet::new();
        self.pools
            .iter()
            .map(|spec| {
                if !names.insert(spec.name.as_str()) {
                    return Err(DeployError::config(format!(
                        "duplicate pool name {}",
                        spec.name
                    )));
                }
                spec.resolve(tokens)
            })
            .collect()
    }
}
