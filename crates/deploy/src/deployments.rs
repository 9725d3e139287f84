//! Persisted records of deployed singleton contracts.
//!
//! Layout: `<deployments_dir>/<network>/<ContractName>.json`.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{DeployError, Result};

/// Name under which the staking factory is recorded.
pub const STAKING_FACTORY: &str = "StakingContractFactory";
/// Name under which the FXD staking contract is recorded.
pub const STAKE_FXD: &str = "StakeFXD";

/// Where and when a contract was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployment {
    pub address: Address,
    pub transaction_hash: B256,
    pub deployer: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Unix timestamp, in seconds.
    pub deployed_at: i64,
    /// Stakekit version that performed the deployment.
    pub stakekit_version: String,
}

impl ContractDeployment {
    pub fn new(
        address: Address,
        transaction_hash: B256,
        deployer: Address,
        block_number: Option<u64>,
    ) -> Self {
        Self {
            address,
            transaction_hash,
            deployer,
            block_number,
            deployed_at: chrono::Utc::now().timestamp(),
            stakekit_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Deployment records of one network.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
    network: String,
}

impl DeploymentStore {
    pub fn new(deployments_dir: &Path, network: &str) -> Self {
        Self {
            dir: deployments_dir.join(network),
            network: network.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Write (or overwrite) the record of `name`.
    ///
    /// Failures are [`DeployError::Store`] errors carrying the deployed address.
    pub fn save(&self, name: &str, deployment: &ContractDeployment) -> Result<PathBuf> {
        let path = self.path_of(name);
        let store_error = |reason: String| DeployError::Store {
            path: path.clone(),
            address: deployment.address,
            reason,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            store_error(format!(
                "failed to create deployments directory {}: {e}",
                self.dir.display()
            ))
        })?;
        let json = serde_json::to_string_pretty(deployment)
            .map_err(|e| store_error(format!("failed to serialize deployment of {name}: {e}")))?;
        std::fs::write(&path, json).map_err(|e| store_error(e.to_string()))?;

        tracing::info!(
            contract = name,
            address = %deployment.address,
            path = %path.display(),
            "Deployment saved"
        );
        Ok(path)
    }

    /// The record of `name`, or `None` if it was never deployed on this network.
    pub fn load(&self, name: &str) -> Result<Option<ContractDeployment>> {
        let path = self.path_of(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            DeployError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let deployment = serde_json::from_str(&content).map_err(|e| {
            DeployError::config(format!("malformed deployment {}: {e}", path.display()))
        })?;
        Ok(Some(deployment))
    }

    /// Like [`DeploymentStore::load`], but a missing record is an error.
    pub fn get(&self, name: &str) -> Result<ContractDeployment> {
        self.load(name)?.ok_or_else(|| {
            let hint = if name == STAKING_FACTORY {
                ", run deploy-factory first"
            } else {
                ""
            };
            DeployError::config(format!(
                "{name} not found on network {}{hint}",
                self.network
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn sample() -> ContractDeployment {
        ContractDeployment::new(
            Address::repeat_byte(0xfa),
            B256::repeat_byte(0x01),
            Address::repeat_byte(0xde),
            Some(12),
        )
    }

    #[test]
    fn test_save_then_get() {
        let dir = TempDir::new("stakekit-deployments").unwrap();
        let store = DeploymentStore::new(dir.path(), "apothem");

        let deployment = sample();
        let path = store.save(STAKING_FACTORY, &deployment).unwrap();

        assert_eq!(
            path,
            dir.path().join("apothem").join("StakingContractFactory.json")
        );
        assert_eq!(store.get(STAKING_FACTORY).unwrap(), deployment);
        assert_eq!(deployment.stakekit_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_records_are_per_network() {
        let dir = TempDir::new("stakekit-deployments").unwrap();
        DeploymentStore::new(dir.path(), "apothem")
            .save(STAKING_FACTORY, &sample())
            .unwrap();

        let xdc = DeploymentStore::new(dir.path(), "xdc");
        assert!(xdc.load(STAKING_FACTORY).unwrap().is_none());

        let err = xdc.get(STAKING_FACTORY).unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
        assert!(err.to_string().contains("run deploy-factory first"));
    }

    #[test]
    fn test_malformed_record() {
        let dir = TempDir::new("stakekit-deployments").unwrap();
        let store = DeploymentStore::new(dir.path(), "apothem");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("StakeFXD.json"), "{").unwrap();

        assert!(matches!(store.load(STAKE_FXD), Err(DeployError::Config(_))));
    }

    #[test]
    fn test_save_failure_names_the_deployed_address() {
        let dir = TempDir::new("stakekit-deployments").unwrap();
        // A file where the deployments directory should be.
        let blocked = dir.path().join("deployments");
        std::fs::write(&blocked, "").unwrap();
        let store = DeploymentStore::new(&blocked, "apothem");

        let deployment = sample();
        let err = store.save(STAKING_FACTORY, &deployment).unwrap_err();

        match &err {
            DeployError::Store { address, .. } => assert_eq!(*address, deployment.address),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains(&deployment.address.to_string()));
    }
}
