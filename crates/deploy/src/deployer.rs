//! Deployment of singleton contracts: the staking factory and `StakeFXD`.

use std::path::Path;

use alloy_core::primitives::{Address, Bytes, U256, utils::format_ether};

use crate::{
    DeployError, NonceManager, Result,
    artifact::ContractArtifact,
    chain::ChainClient,
    contracts::stake_fxd_constructor_args,
    deployments::{ContractDeployment, DeploymentStore, STAKE_FXD, STAKING_FACTORY},
    submitter::{Call, TransactionSubmitter},
};

/// Version argument passed to the `StakeFXD` constructor.
pub const STAKE_FXD_VERSION: u64 = 1;

/// Log the deployer account and its balance.
pub async fn log_account<C: ChainClient>(chain: &C, account: Address) -> Result<U256> {
    let balance = chain.balance(account).await?;
    tracing::info!(account = %account, balance = %format_ether(balance), "Deployer account");
    Ok(balance)
}

/// Deploys contracts from compiled artifacts and records them in the store.
pub struct ContractDeployer<'a, C> {
    submitter: TransactionSubmitter<'a, C>,
    store: &'a DeploymentStore,
}

impl<'a, C: ChainClient> ContractDeployer<'a, C> {
    pub fn new(submitter: TransactionSubmitter<'a, C>, store: &'a DeploymentStore) -> Self {
        Self { submitter, store }
    }

    /// Clear any pending nonce, send the creation transaction and save the record.
    ///
    /// An existing record under `name` is overwritten.
    pub async fn deploy(
        &self,
        nonces: &mut NonceManager,
        name: &str,
        init_code: Bytes,
    ) -> Result<ContractDeployment> {
        let deployer = self.submitter.signer().address();
        log_account(self.submitter.chain(), deployer).await?;

        if let Some(previous) = self.store.load(name)? {
            tracing::warn!(
                contract = name,
                previous = %previous.address,
                "Contract already deployed on this network, deploying a new instance"
            );
        }

        self.submitter.clear_pending_nonce(nonces).await?;

        tracing::info!(contract = name, size = init_code.len(), "Deploying contract...");
        let receipt = self.submitter.send(nonces, Call::create(init_code)).await?;
        let address = receipt.contract_address.ok_or_else(|| DeployError::Revert {
            tx_hash: Some(receipt.transaction_hash),
            reason: "receipt carries no contract address".to_string(),
        })?;

        let deployment = ContractDeployment::new(
            address,
            receipt.transaction_hash,
            deployer,
            receipt.block_number,
        );
        self.store.save(name, &deployment)?;

        tracing::info!(contract = name, address = %address, "Contract deployed");
        Ok(deployment)
    }

    /// Deploy `StakingContractFactory` (no constructor arguments).
    pub async fn deploy_factory(
        &self,
        nonces: &mut NonceManager,
        artifacts_dir: &Path,
    ) -> Result<ContractDeployment> {
        let artifact = ContractArtifact::load(artifacts_dir, STAKING_FACTORY)?;
        self.deploy(nonces, STAKING_FACTORY, artifact.bytecode).await
    }

    /// Deploy `StakeFXD(fxd, 1)`.
    pub async fn deploy_stake_fxd(
        &self,
        nonces: &mut NonceManager,
        artifacts_dir: &Path,
        fxd: Address,
    ) -> Result<ContractDeployment> {
        let artifact = ContractArtifact::load(artifacts_dir, STAKE_FXD)?;
        let args = stake_fxd_constructor_args(fxd, U256::from(STAKE_FXD_VERSION));
        self.deploy(nonces, STAKE_FXD, artifact.init_code(&args)).await
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::{
        submitter::SubmitterConfig,
        testkit::{self, FACTORY_BYTECODE, MockChain},
    };

    fn fast_config() -> SubmitterConfig {
        SubmitterConfig {
            confirmation_timeout_secs: 2,
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    fn write_artifact(dir: &Path, name: &str, bytecode: &[u8]) {
        std::fs::write(
            ContractArtifact::path(dir, name),
            format!(r#"{{"contractName": "{name}", "bytecode": "0x{}"}}"#, hex::encode(bytecode)),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_deploy_factory_records_address() {
        let dir = TempDir::new("stakekit-deployer").unwrap();
        write_artifact(dir.path(), STAKING_FACTORY, FACTORY_BYTECODE);
        let store = DeploymentStore::new(dir.path(), "hardhat");

        let chain = MockChain::new();
        let signer = testkit::signer();
        let deployer = ContractDeployer::new(
            TransactionSubmitter::new(&chain, &signer, fast_config()),
            &store,
        );

        let mut nonces = NonceManager::new(signer.address());
        let deployment = deployer.deploy_factory(&mut nonces, dir.path()).await.unwrap();

        // Nonce 0 clears, nonce 1 creates.
        assert_eq!(nonces.issued(), &[0, 1]);
        assert_eq!(deployment.address, signer.address().create(1));
        assert_eq!(deployment.deployer, signer.address());
        assert!(chain.has_code(deployment.address));
        assert_eq!(store.get(STAKING_FACTORY).unwrap(), deployment);

        let sent = chain.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, None);
        assert_eq!(sent[1].payload.as_ref(), FACTORY_BYTECODE);
    }

    #[tokio::test]
    async fn test_deploy_stake_fxd_appends_constructor_args() {
        let dir = TempDir::new("stakekit-deployer").unwrap();
        write_artifact(dir.path(), STAKE_FXD, &[0x60, 0x80]);
        let store = DeploymentStore::new(dir.path(), "hardhat");

        let chain = MockChain::new();
        let signer = testkit::signer();
        let deployer = ContractDeployer::new(
            TransactionSubmitter::new(&chain, &signer, fast_config()),
            &store,
        );

        let fxd = Address::repeat_byte(0xfd);
        let mut nonces = NonceManager::new(signer.address());
        deployer
            .deploy_stake_fxd(&mut nonces, dir.path(), fxd)
            .await
            .unwrap();

        let payload = chain.sent()[1].payload.clone();
        assert_eq!(&payload[..2], &[0x60, 0x80]);
        assert_eq!(&payload[2..], stake_fxd_constructor_args(fxd, U256::from(1)).as_ref());
        assert!(store.load(STAKE_FXD).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_artifact_sends_nothing() {
        let dir = TempDir::new("stakekit-deployer").unwrap();
        let store = DeploymentStore::new(dir.path(), "hardhat");

        let chain = MockChain::new();
        let signer = testkit::signer();
        let deployer = ContractDeployer::new(
            TransactionSubmitter::new(&chain, &signer, fast_config()),
            &store,
        );

        let mut nonces = NonceManager::new(signer.address());
        let err = deployer.deploy_factory(&mut nonces, dir.path()).await.unwrap_err();

        assert!(matches!(err, DeployError::Config(_)));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unsaved_record_still_reports_the_contract() {
        let dir = TempDir::new("stakekit-deployer").unwrap();
        write_artifact(dir.path(), STAKING_FACTORY, FACTORY_BYTECODE);
        let blocked = dir.path().join("deployments");
        std::fs::write(&blocked, "").unwrap();
        let store = DeploymentStore::new(&blocked, "hardhat");

        let chain = MockChain::new();
        let signer = testkit::signer();
        let deployer = ContractDeployer::new(
            TransactionSubmitter::new(&chain, &signer, fast_config()),
            &store,
        );

        let mut nonces = NonceManager::new(signer.address());
        let err = deployer.deploy_factory(&mut nonces, dir.path()).await.unwrap_err();

        let deployed = signer.address().create(1);
        assert!(chain.has_code(deployed));
        assert!(matches!(err, DeployError::Store { address, .. } if address == deployed));
    }
}
