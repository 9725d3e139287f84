//! Integration tests for stakekit-deploy.
//!
//! These tests drive full deployment runs against the in-memory chain from
//! the `testkit` feature: factory deployment, pool sequencing and the failure
//! scenarios the orchestrator must survive or report.
//! Run with: cargo test --test integration_test

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use stakekit_deploy::{
    ContractDeployer, DeployError, DeploymentStore, NonceManager, PoolConfig,
    PoolDeploymentSequencer, PoolStatus, STAKING_FACTORY, Step, SubmitterConfig,
    TransactionSigner, TransactionSubmitter, artifact::ContractArtifact,
    contracts::{FactoryContract, PoolContract},
    locate_factory,
    testkit::{self, FACTORY_BYTECODE, MockChain, fixtures},
};
use tempdir::TempDir;

const CGO: Address = Address::repeat_byte(0xc6);
const FXD: Address = Address::repeat_byte(0xfd);
const XDC: Address = Address::repeat_byte(0x0d);

/// Test setup context: a mock chain with a factory deployed through the
/// regular deployer and recorded in a temporary deployment store.
struct TestContext {
    dir: TempDir,
    chain: MockChain,
    signer: TransactionSigner,
    store: DeploymentStore,
}

impl TestContext {
    fn empty() -> Result<Self> {
        let dir = TempDir::new("stakekit-it").context("Failed to create temp dir")?;
        let store = DeploymentStore::new(dir.path(), "hardhat");
        Ok(Self {
            dir,
            chain: MockChain::new(),
            signer: testkit::signer(),
            store,
        })
    }

    async fn with_factory() -> Result<Self> {
        let ctx = Self::empty()?;
        let artifacts = ctx.dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts)?;
        std::fs::write(
            ContractArtifact::path(&artifacts, STAKING_FACTORY),
            format!(r#"{{"bytecode": "0x{}"}}"#, hex::encode(FACTORY_BYTECODE)),
        )?;

        let deployer = ContractDeployer::new(ctx.submitter(), &ctx.store);
        let mut nonces = NonceManager::new(ctx.signer.address());
        deployer
            .deploy_factory(&mut nonces, &artifacts)
            .await
            .context("Failed to deploy factory")?;
        Ok(ctx)
    }

    fn submitter(&self) -> TransactionSubmitter<'_, MockChain> {
        let config = SubmitterConfig {
            confirmation_timeout_secs: 2,
            poll_interval_ms: 10,
            ..Default::default()
        };
        TransactionSubmitter::new(&self.chain, &self.signer, config)
    }

    async fn sequencer(&self) -> Result<PoolDeploymentSequencer<'_, MockChain>> {
        let factory = locate_factory(&self.chain, &self.store).await?;
        Ok(PoolDeploymentSequencer::new(self.submitter(), factory))
    }

    fn nonces(&self) -> NonceManager {
        NonceManager::new(self.signer.address())
    }
}

#[tokio::test]
async fn test_single_pool_is_deployed_and_readable() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    let sequencer = ctx.sequencer().await?;

    let report = sequencer
        .run(&mut ctx.nonces(), &[fixtures::xdc_pool(XDC)])
        .await?;

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.status, PoolStatus::Deployed);
    assert_eq!(record.pool_name, "XDC Premium Pool");

    let pool = PoolContract::new(&ctx.chain, record.contract_address);
    assert_eq!(pool.min_stake_amount().await?, U256::from(10_000));
    assert_eq!(pool.interest().await?, U256::from(7));
    assert_eq!(pool.staking_token().await?, XDC);
    Ok(())
}

#[tokio::test]
async fn test_all_pools_deploy_in_order() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    let sequencer = ctx.sequencer().await?;
    let pools = fixtures::all_pools(CGO, FXD, XDC);

    let report = sequencer.run(&mut ctx.nonces(), &pools).await?;

    assert_eq!(report.records.len(), pools.len());
    assert!(report.records.iter().all(|r| r.status == PoolStatus::Deployed));
    assert_eq!(
        report.pool_count_after,
        report.pool_count_before + U256::from(pools.len())
    );

    let names: Vec<_> = report.records.iter().map(|r| r.pool_name.as_str()).collect();
    assert_eq!(
        names,
        ["CGO Staking Pool B", "FXD Growth Pool", "XDC Premium Pool"]
    );

    let factory = FactoryContract::new(&ctx.chain, sequencer.factory());
    let registered = factory.pools().await?;
    let recorded: Vec<_> = report.records.iter().map(|r| r.contract_address).collect();
    assert_eq!(registered, recorded);

    for (record, config) in report.records.iter().zip(&pools) {
        let state = PoolContract::new(&ctx.chain, record.contract_address)
            .state()
            .await?;
        assert_eq!(state.pool_name, config.name);
        assert_eq!(state.cool_off, U256::from(config.cool_off));
        assert_eq!(state.max_pool_amount, U256::from(config.max_pool_amount));
    }
    Ok(())
}

#[tokio::test]
async fn test_nonces_are_strictly_increasing() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    let sequencer = ctx.sequencer().await?;
    let pools = fixtures::all_pools(CGO, FXD, XDC);

    let report = sequencer.run(&mut ctx.nonces(), &pools).await?;

    // One clearing transaction, then create + initialize per pool.
    assert_eq!(report.nonces.len(), 1 + 2 * pools.len());
    assert!(report.nonces.windows(2).all(|w| w[1] == w[0] + 1));

    let sent: Vec<u64> = ctx.chain.sent().iter().map(|tx| tx.nonce).collect();
    assert!(sent.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(sent.last(), report.nonces.last());
    Ok(())
}

#[tokio::test]
async fn test_rerun_creates_new_pools() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    let sequencer = ctx.sequencer().await?;
    let pools = vec![fixtures::xdc_pool(XDC)];

    let first = sequencer.run(&mut ctx.nonces(), &pools).await?;
    let second = sequencer.run(&mut ctx.nonces(), &pools).await?;

    assert_ne!(
        first.records[0].contract_address,
        second.records[0].contract_address
    );
    assert_eq!(second.pool_count_before, U256::from(1));
    assert_eq!(second.pool_count_after, U256::from(2));
    Ok(())
}

#[tokio::test]
async fn test_missing_factory_sends_nothing() -> Result<()> {
    let ctx = TestContext::empty()?;

    let err = locate_factory(&ctx.chain, &ctx.store).await.unwrap_err();

    assert!(matches!(err, DeployError::Config(_)));
    assert!(err.to_string().contains(STAKING_FACTORY));
    assert!(ctx.chain.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_initialize_revert_keeps_created_pool() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    ctx.chain.revert_initialize(true);
    let sequencer = ctx.sequencer().await?;

    let failure = sequencer
        .run(&mut ctx.nonces(), &[fixtures::xdc_pool(XDC)])
        .await
        .unwrap_err();

    assert!(matches!(failure.error, DeployError::Revert { .. }));
    assert_eq!(
        failure.last_step,
        Some(Step::Created("XDC Premium Pool".to_string()))
    );
    assert_eq!(failure.records.len(), 1);
    assert_eq!(failure.records[0].status, PoolStatus::Failed);
    assert!(ctx.chain.has_code(failure.records[0].contract_address));
    assert!(!ctx.chain.is_initialized(failure.records[0].contract_address));
    Ok(())
}

#[tokio::test]
async fn test_failure_stops_remaining_pools() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    ctx.chain.revert_initialize(true);
    let sequencer = ctx.sequencer().await?;
    let pools = fixtures::all_pools(CGO, FXD, XDC);

    let failure = sequencer.run(&mut ctx.nonces(), &pools).await.unwrap_err();

    assert_eq!(failure.records.len(), 1);
    assert_eq!(ctx.chain.pools_of(sequencer.factory()).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stale_clearing_transaction_is_recovered() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    ctx.chain.reject_next_send("nonce too low: next nonce 3, tx nonce 2");
    let sequencer = ctx.sequencer().await?;

    let report = sequencer
        .run(&mut ctx.nonces(), &[fixtures::xdc_pool(XDC)])
        .await?;

    assert_eq!(report.records[0].status, PoolStatus::Deployed);
    // The rejected clearing nonce is released and reused by the create call.
    assert_eq!(report.nonces.len(), 2);
    assert!(report.nonces.windows(2).all(|w| w[1] == w[0] + 1));

    let sent: Vec<u64> = ctx.chain.sent().iter().map(|tx| tx.nonce).collect();
    assert_eq!(sent[sent.len() - 2..], report.nonces[..]);
    Ok(())
}

#[tokio::test]
async fn test_other_clearing_failures_abort() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    ctx.chain.reject_next_send("insufficient funds for gas * price + value");
    let sequencer = ctx.sequencer().await?;

    let failure = sequencer
        .run(&mut ctx.nonces(), &[fixtures::xdc_pool(XDC)])
        .await
        .unwrap_err();

    assert!(matches!(failure.error, DeployError::Submission { .. }));
    assert_eq!(failure.last_step, None);
    assert!(failure.records.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_pool_event_is_a_revert() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    ctx.chain.omit_pool_event(true);
    let sequencer = ctx.sequencer().await?;

    let failure = sequencer
        .run(&mut ctx.nonces(), &[fixtures::xdc_pool(XDC)])
        .await
        .unwrap_err();

    assert!(matches!(failure.error, DeployError::Revert { tx_hash: Some(_), .. }));
    assert!(failure.error.to_string().contains("PoolDeployed"));
    assert_eq!(failure.last_step, Some(Step::Cleared));
    assert!(failure.records.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_pool_list_feeds_sequencer() -> Result<()> {
    let ctx = TestContext::with_factory().await?;
    let path = ctx.dir.path().join("pools.toml");
    std::fs::write(
        &path,
        r#"
[[pools]]
token = "XDC"
name = "XDC Premium Pool"
min_stake_amount = 10000
max_stake_amount = 1000000
cool_off = 259200
redeem_interval = 43200
max_pool_amount = 5000000
interest_precision = 1000000
interest = 7
decimals = 18
"#,
    )?;

    let tokens = [("XDC".to_string(), XDC)].into_iter().collect();
    let pools: Vec<PoolConfig> = stakekit_deploy::PoolList::load(&path)?.resolve(&tokens)?;
    assert_eq!(pools, vec![fixtures::xdc_pool(XDC)]);

    let report = ctx.sequencer().await?.run(&mut ctx.nonces(), &pools).await?;
    assert_eq!(report.records[0].status, PoolStatus::Deployed);
    Ok(())
}

#[tokio::test]
async fn test_shipped_pool_list_matches_fixtures() -> Result<()> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../pools/apothem.toml");
    let tokens = [
        ("CGO".to_string(), CGO),
        ("FXD".to_string(), FXD),
        ("XDC".to_string(), XDC),
    ]
    .into_iter()
    .collect();

    let pools = stakekit_deploy::PoolList::load(&path)?.resolve(&tokens)?;
    assert_eq!(pools, fixtures::all_pools(CGO, FXD, XDC));

    let ctx = TestContext::with_factory().await?;
    let report = ctx.sequencer().await?.run(&mut ctx.nonces(), &pools).await?;
    assert_eq!(report.records.len(), 3);
    Ok(())
}
