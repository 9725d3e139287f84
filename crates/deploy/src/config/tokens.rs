use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{DeployError, Result};

/// Token addresses of one network, keyed by symbol (`configs/<network>.json`).
///
/// Values that are not addresses are kept but cannot be resolved as tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenConfig {
    entries: BTreeMap<String, serde_json::Value>,
}

impl TokenConfig {
    /// Load `<dir>/<name>.json`.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DeployError::config(format!(
                "failed to read token config {}: {e}",
                path.display()
            ))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            DeployError::config(format!(
                "malformed token config {}: {e}",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), tokens = config.entries.len(), "Token config loaded");
        Ok(config)
    }

    /// The address registered for `symbol`.
    pub fn address(&self, symbol: &str) -> Result<Address> {
        let value = self
            .entries
            .get(symbol)
            .ok_or_else(|| DeployError::config(format!("token {symbol} missing from token config")))?;

        value
            .as_str()
            .and_then(|s| s.parse::<Address>().ok())
            .ok_or_else(|| {
                DeployError::config(format!("token {symbol} is not an address: {value}"))
            })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Address)> for TokenConfig {
    fn from_iter<I: IntoIterator<Item = (String, Address)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(symbol, address)| (symbol, serde_json::Value::String(address.to_string())))
                .collect(),
        }
    }
}
