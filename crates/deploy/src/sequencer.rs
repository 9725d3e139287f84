//! Sequential deployment of staking pools through the factory.

use std::fmt::Display;

use alloy_core::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    DecodeError, DeployError, NonceManager, Result,
    chain::ChainClient,
    config::PoolConfig,
    contracts::{
        FactoryContract, PoolContract, create_pool_calldata, decode_pool_deployed,
        initialize_calldata,
    },
    deployments::{DeploymentStore, STAKING_FACTORY},
    submitter::{Call, TransactionSubmitter},
};

/// Lifecycle of a pool within one run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    /// The factory created the pool.
    Created,
    /// `initialize` was mined.
    Initialized,
    /// The on-chain configuration was read back and matches.
    Deployed,
    Failed,
}

/// Outcome for one configured pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub pool_name: String,
    pub contract_address: Address,
    pub status: PoolStatus,
    pub create_tx: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_tx: Option<B256>,
}

/// How much of a pool's configuration is read back after initialization.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VerifyMode {
    /// `minStakeAmount` and `interest` only.
    Minimal,
    /// Every accessor, including token and name.
    #[default]
    Full,
}

/// A step of the run that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Step {
    #[display("clearing transaction")]
    Cleared,
    #[display("create {_0}")]
    Created(String),
    #[display("initialize {_0}")]
    Initialized(String),
    #[display("verify {_0}")]
    Verified(String),
    #[display("factory registry check")]
    RegistryVerified,
}

fn fmt_step(step: &Option<Step>) -> String {
    match step {
        Some(step) => step.to_string(),
        None => "none".to_string(),
    }
}

/// An aborted run, with everything it managed to do before failing.
#[derive(Debug, thiserror::Error)]
#[error("pool deployment aborted (last completed step: {})", fmt_step(.last_step))]
pub struct SequencerFailure {
    #[source]
    pub error: DeployError,
    pub last_step: Option<Step>,
    /// Records so far. A pool whose run failed midway is marked `Failed`.
    pub records: Vec<DeploymentRecord>,
    pub nonces: Vec<u64>,
}

/// A completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub factory: Address,
    pub records: Vec<DeploymentRecord>,
    /// Nonces consumed, in order, including the clearing transaction.
    pub nonces: Vec<u64>,
    pub pool_count_before: U256,
    pub pool_count_after: U256,
}

#[derive(Default)]
struct Progress {
    last_step: Option<Step>,
    records: Vec<DeploymentRecord>,
}

/// Resolve the factory recorded for this network and check it has code.
pub async fn locate_factory<C: ChainClient>(chain: &C, store: &DeploymentStore) -> Result<Address> {
    let deployment = store.get(STAKING_FACTORY)?;
    ensure_factory_code(chain, deployment.address).await?;

    tracing::info!(factory = %deployment.address, network = store.network(), "Found factory");
    Ok(deployment.address)
}

async fn ensure_factory_code<C: ChainClient>(chain: &C, factory: Address) -> Result<()> {
    let code = chain.code(factory).await?;
    if code.is_empty() {
        return Err(DeployError::config(format!(
            "{STAKING_FACTORY} not found: no code at {factory}"
        )));
    }
    Ok(())
}

/// Deploys pools one at a time: create, initialize, verify.
///
/// Runs are not idempotent: every run creates new pools.
pub struct PoolDeploymentSequencer<'a, C> {
    submitter: TransactionSubmitter<'a, C>,
    factory: Address,
    verify: VerifyMode,
}

impl<'a, C: ChainClient> PoolDeploymentSequencer<'a, C> {
    pub fn new(submitter: TransactionSubmitter<'a, C>, factory: Address) -> Self {
        Self {
            submitter,
            factory,
            verify: VerifyMode::default(),
        }
    }

    pub fn verify_mode(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Deploy `pools` in order. The first failure aborts the run.
    pub async fn run(
        &self,
        nonces: &mut NonceManager,
        pools: &[PoolConfig],
    ) -> std::result::Result<DeploymentReport, SequencerFailure> {
        let mut progress = Progress::default();

        match self.execute(nonces, pools, &mut progress).await {
            Ok(report) => Ok(report),
            Err(error) => {
                if let Some(record) = progress
                    .records
                    .last_mut()
                    .filter(|r| r.status != PoolStatus::Deployed)
                {
                    record.status = PoolStatus::Failed;
                }
                tracing::error!(
                    error = %error,
                    last_step = %fmt_step(&progress.last_step),
                    "Pool deployment aborted"
                );
                Err(SequencerFailure {
                    error,
                    last_step: progress.last_step,
                    records: progress.records,
                    nonces: nonces.issued().to_vec(),
                })
            }
        }
    }

    async fn execute(
        &self,
        nonces: &mut NonceManager,
        pools: &[PoolConfig],
        progress: &mut Progress,
    ) -> Result<DeploymentReport> {
        ensure_factory_code(self.submitter.chain(), self.factory).await?;
        let factory = FactoryContract::new(self.submitter.chain(), self.factory);
        let pool_count_before = factory.pool_count().await?;
        tracing::info!(
            factory = %self.factory,
            pools = pools.len(),
            existing = %pool_count_before,
            "Starting pool deployment..."
        );

        self.submitter.clear_pending_nonce(nonces).await?;
        progress.last_step = Some(Step::Cleared);

        for pool in pools {
            self.deploy_pool(nonces, pool, progress).await?;
        }

        let pool_count_after = self
            .verify_registry(&factory, pool_count_before, &progress.records)
            .await?;
        progress.last_step = Some(Step::RegistryVerified);

        tracing::info!(
            deployed = progress.records.len(),
            pool_count = %pool_count_after,
            "Pool deployment complete"
        );

        Ok(DeploymentReport {
            factory: self.factory,
            records: progress.records.clone(),
            nonces: nonces.issued().to_vec(),
            pool_count_before,
            pool_count_after,
        })
    }

    async fn deploy_pool(
        &self,
        nonces: &mut NonceManager,
        pool: &PoolConfig,
        progress: &mut Progress,
    ) -> Result<()> {
        tracing::info!(
            pool = %pool.name,
            token = %pool.token_address,
            interest = pool.interest,
            "Creating pool through factory..."
        );

        let receipt = self
            .submitter
            .send(nonces, Call::contract(self.factory, create_pool_calldata(pool)))
            .await?;
        let address = match decode_pool_deployed(&receipt, self.factory) {
            Ok(address) => address,
            Err(e @ DecodeError::EventNotFound { .. }) => {
                return Err(DeployError::Revert {
                    tx_hash: Some(receipt.transaction_hash),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        progress.records.push(DeploymentRecord {
            pool_name: pool.name.clone(),
            contract_address: address,
            status: PoolStatus::Created,
            create_tx: receipt.transaction_hash,
            initialize_tx: None,
        });
        progress.last_step = Some(Step::Created(pool.name.clone()));
        tracing::info!(pool = %pool.name, address = %address, status = %PoolStatus::Created, "Pool created");

        let receipt = self
            .submitter
            .send(nonces, Call::contract(address, initialize_calldata(pool)))
            .await?;
        set_status(progress, PoolStatus::Initialized, Some(receipt.transaction_hash));
        progress.last_step = Some(Step::Initialized(pool.name.clone()));
        tracing::info!(pool = %pool.name, address = %address, status = %PoolStatus::Initialized, "Pool initialized");

        self.verify_pool(address, pool).await?;
        set_status(progress, PoolStatus::Deployed, None);
        progress.last_step = Some(Step::Verified(pool.name.clone()));
        tracing::info!(pool = %pool.name, address = %address, status = %PoolStatus::Deployed, "Pool verified");

        Ok(())
    }

    /// Read back the pool's configuration and compare it with `pool`.
    async fn verify_pool(&self, address: Address, pool: &PoolConfig) -> Result<()> {
        let contract = PoolContract::new(self.submitter.chain(), address);

        match self.verify {
            VerifyMode::Minimal => {
                check(
                    "minStakeAmount",
                    address,
                    U256::from(pool.min_stake_amount),
                    contract.min_stake_amount().await?,
                )?;
                check(
                    "interest",
                    address,
                    U256::from(pool.interest),
                    contract.interest().await?,
                )
            }
            VerifyMode::Full => {
                let state = contract.state().await?;
                check("minStakeAmount", address, U256::from(pool.min_stake_amount), state.min_stake_amount)?;
                check("maxStakeAmount", address, U256::from(pool.max_stake_amount), state.max_stake_amount)?;
                check("coolOff", address, U256::from(pool.cool_off), state.cool_off)?;
                check("redeemInterval", address, U256::from(pool.redeem_interval), state.redeem_interval)?;
                check("maxPoolAmount", address, U256::from(pool.max_pool_amount), state.max_pool_amount)?;
                check("interest", address, U256::from(pool.interest), state.interest)?;
                check("stakingToken", address, pool.token_address, state.staking_token)?;
                check("poolName", address, pool.name.as_str(), state.pool_name.as_str())
            }
        }
    }

    /// The factory must have registered exactly the pools of this run, in order.
    async fn verify_registry(
        &self,
        factory: &FactoryContract<'a, C>,
        before: U256,
        records: &[DeploymentRecord],
    ) -> Result<U256> {
        let after = factory.pool_count().await?;
        let expected = before + U256::from(records.len());
        check("poolCount", self.factory, expected, after)?;

        for (offset, record) in records.iter().enumerate() {
            let registered = factory.pool(before + U256::from(offset)).await?;
            check("getPool", self.factory, record.contract_address, registered)?;
        }
        Ok(after)
    }
}

fn set_status(progress: &mut Progress, status: PoolStatus, initialize_tx: Option<B256>) {
    if let Some(record) = progress.records.last_mut() {
        record.status = status;
        if initialize_tx.is_some() {
            record.initialize_tx = initialize_tx;
        }
    }
}

fn check<T: PartialEq + Display>(
    field: &'static str,
    address: Address,
    expected: T,
    actual: T,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(DeployError::Verification {
        field,
        address,
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::{
        deployments::ContractDeployment,
        submitter::SubmitterConfig,
        testkit::{self, MockChain, fixtures},
    };

    fn fast_config() -> SubmitterConfig {
        SubmitterConfig {
            confirmation_timeout_secs: 2,
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_and_mode_names() {
        assert_eq!(PoolStatus::Initialized.to_string(), "initialized");
        assert_eq!("full".parse::<VerifyMode>().unwrap(), VerifyMode::Full);
        assert_eq!("minimal".parse::<VerifyMode>().unwrap(), VerifyMode::Minimal);
        assert_eq!(VerifyMode::default(), VerifyMode::Full);
    }

    #[test]
    fn test_failure_message_names_last_step() {
        let failure = SequencerFailure {
            error: DeployError::config("boom"),
            last_step: Some(Step::Created("XDC Premium Pool".to_string())),
            records: Vec::new(),
            nonces: Vec::new(),
        };
        assert_eq!(
            failure.to_string(),
            "pool deployment aborted (last completed step: create XDC Premium Pool)"
        );
    }

    #[tokio::test]
    async fn test_locate_factory_requires_record_and_code() {
        let dir = TempDir::new("stakekit-sequencer").unwrap();
        let store = DeploymentStore::new(dir.path(), "hardhat");
        let (chain, factory) = MockChain::with_factory();

        assert!(matches!(
            locate_factory(&chain, &store).await,
            Err(DeployError::Config(_))
        ));

        let record = |address| {
            ContractDeployment::new(address, B256::ZERO, testkit::deployer_address(), None)
        };
        store
            .save(STAKING_FACTORY, &record(Address::repeat_byte(0x99)))
            .unwrap();
        assert!(matches!(
            locate_factory(&chain, &store).await,
            Err(DeployError::Config(_))
        ));

        store.save(STAKING_FACTORY, &record(factory)).unwrap();
        assert_eq!(locate_factory(&chain, &store).await.unwrap(), factory);
    }

    #[tokio::test]
    async fn test_run_without_factory_code_sends_nothing() {
        let chain = MockChain::new();
        let signer = testkit::signer();
        let submitter = TransactionSubmitter::new(&chain, &signer, fast_config());
        let sequencer = PoolDeploymentSequencer::new(submitter, Address::repeat_byte(0x99));

        let mut nonces = NonceManager::new(signer.address());
        let failure = sequencer
            .run(&mut nonces, &[fixtures::xdc_pool(Address::repeat_byte(0x0d))])
            .await
            .unwrap_err();

        assert!(matches!(failure.error, DeployError::Config(_)));
        assert!(failure.error.to_string().contains(STAKING_FACTORY));
        assert_eq!(failure.last_step, None);
        assert!(failure.records.is_empty());
        assert!(failure.nonces.is_empty());
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_minimal_verification_ignores_other_fields() {
        let (chain, factory) = MockChain::with_factory();
        let signer = testkit::signer();
        let submitter = TransactionSubmitter::new(&chain, &signer, fast_config());
        let sequencer =
            PoolDeploymentSequencer::new(submitter, factory).verify_mode(VerifyMode::Minimal);

        let mut nonces = NonceManager::new(signer.address());
        let report = sequencer
            .run(&mut nonces, &[fixtures::xdc_pool(Address::repeat_byte(0x0d))])
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].status, PoolStatus::Deployed);
        assert!(report.records[0].initialize_tx.is_some());
        assert_eq!(report.pool_count_after, report.pool_count_before + U256::from(1));
    }

    #[tokio::test]
    async fn test_corrupted_state_fails_verification() {
        let (chain, factory) = MockChain::with_factory();
        chain.corrupt_min_stake(true);
        let signer = testkit::signer();
        let submitter = TransactionSubmitter::new(&chain, &signer, fast_config());
        let sequencer = PoolDeploymentSequencer::new(submitter, factory);

        let mut nonces = NonceManager::new(signer.address());
        let failure = sequencer
            .run(&mut nonces, &[fixtures::xdc_pool(Address::repeat_byte(0x0d))])
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            DeployError::Verification {
                field: "minStakeAmount",
                ..
            }
        ));
        assert_eq!(
            failure.last_step,
            Some(Step::Initialized("XDC Premium Pool".to_string()))
        );
        assert_eq!(failure.records[0].status, PoolStatus::Failed);
    }
}
