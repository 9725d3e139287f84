use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DeployError, Result, submitter::SubmitterConfig};

/// The default name for the stakekit configuration file.
pub const STAKEKIT_CONFIG_FILENAME: &str = "Stakekit.toml";

/// Prefix of environment variables overriding the configuration file.
///
/// Nested keys are separated by `__`, e.g.
/// `STAKEKIT_SUBMITTER__GAS_PRICE_MULTIPLIER_PCT=300`.
pub const ENV_PREFIX: &str = "STAKEKIT_";

const DEFAULT_PRIVATE_KEY_ENV: &str = "PRIVATE_KEY_1";
const ANVIL_FORKING_CHAIN_ENV: &str = "ANVIL_FORKING_CHAIN_NAME";

fn default_private_key_env() -> String {
    DEFAULT_PRIVATE_KEY_ENV.to_string()
}

/// Connection settings of one named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Name of the environment variable holding the deployer's private key.
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    /// Environment variable naming the chain whose token config applies.
    ///
    /// Used by forks, whose token addresses are those of the forked chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forking_chain_env: Option<String>,
}

impl NetworkConfig {
    fn new(rpc_url: &str, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            chain_id,
            private_key_env: default_private_key_env(),
            forking_chain_env: None,
        }
    }

    pub fn rpc_url(&self) -> Result<Url> {
        Url::parse(&self.rpc_url)
            .map_err(|e| DeployError::config(format!("invalid rpc url {}: {e}", self.rpc_url)))
    }

    /// Read the deployer key from the configured environment variable.
    pub fn private_key(&self) -> Result<String> {
        std::env::var(&self.private_key_env).map_err(|_| {
            DeployError::config(format!(
                "environment variable {} with the deployer key is not set",
                self.private_key_env
            ))
        })
    }

    /// Name of the token config to use when deploying to `network`.
    pub fn token_config_name(&self, network: &str) -> Result<String> {
        match &self.forking_chain_env {
            None => Ok(network.to_string()),
            Some(var) => std::env::var(var).map_err(|_| {
                DeployError::config(format!(
                    "network {network} is a fork: set {var} to the forked chain name"
                ))
            }),
        }
    }
}

/// Top-level configuration, usually read from `Stakekit.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakekitConfig {
    /// Directory of `<network>.json` token address files.
    pub configs_dir: PathBuf,
    /// Directory of persisted contract deployments.
    pub deployments_dir: PathBuf,
    /// Directory of compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    pub submitter: SubmitterConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for StakekitConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert("xdc".to_string(), NetworkConfig::new("https://rpc.xdcrpc.com", 50));
        networks.insert(
            "apothem".to_string(),
            NetworkConfig::new("https://apothem.xdcrpc.com", 51),
        );
        networks.insert(
            "hardhat".to_string(),
            NetworkConfig::new("http://127.0.0.1:8545", 1337),
        );
        networks.insert(
            "anvil".to_string(),
            NetworkConfig {
                forking_chain_env: Some(ANVIL_FORKING_CHAIN_ENV.to_string()),
                ..NetworkConfig::new("http://127.0.0.1:8545", 31337)
            },
        );

        Self {
            configs_dir: PathBuf::from("configs"),
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            submitter: SubmitterConfig::default(),
            networks,
        }
    }
}

impl StakekitConfig {
    /// Load the configuration: built-in defaults, then the TOML file, then
    /// `STAKEKIT_*` environment variables.
    ///
    /// Without an explicit path, `Stakekit.toml` in the working directory is
    /// used when present. An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                let path = if path.is_dir() {
                    path.join(STAKEKIT_CONFIG_FILENAME)
                } else {
                    path.to_path_buf()
                };
                if !path.exists() {
                    return Err(DeployError::config(format!(
                        "configuration file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(&path));
                tracing::debug!(path = %path.display(), "Using configuration file");
            }
            None if Path::new(STAKEKIT_CONFIG_FILENAME).exists() => {
                figment = figment.merge(Toml::file(STAKEKIT_CONFIG_FILENAME));
            }
            None => {}
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DeployError::config(format!("invalid configuration: {e}")))?;
        config.submitter.validate()?;
        Ok(config)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            let known = self.networks.keys().cloned().collect::<Vec<_>>().join(", ");
            DeployError::config(format!("unknown network {name} (known: {known})"))
        })
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DeployError::config(format!("failed to serialize configuration: {e}")))
    }
}
