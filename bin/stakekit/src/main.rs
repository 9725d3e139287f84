//! stakekit is a CLI tool to deploy the staking factory, its pools and StakeFXD.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use stakekit_deploy::{
    ChainClient, ContractDeployer, DeploymentStore, NonceManager, PoolDeploymentSequencer,
    PoolList, RpcClient, StakekitConfig, TokenConfig, TransactionSigner, TransactionSubmitter,
    config::NetworkConfig,
    contracts::{FactoryContract, PoolContract},
    locate_factory, log_account,
    report::{nonce_range, pools_table, records_table},
};

/// Dotenv file read at startup, relative to the working directory.
const DOTENV_FILE: &str = ".env";

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so `.env` can also hold `STAKEKIT_*` flags.
    let dotenv_loaded = load_env_file(Path::new(DOTENV_FILE))?;
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();
    if dotenv_loaded {
        tracing::debug!(path = DOTENV_FILE, "Loaded environment file");
    }

    let config =
        StakekitConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Config => {
            println!("{}", config.to_toml()?);
        }

        Command::Pools => {
            let (_, chain, store) = connect(&config, &cli.network, cli.rpc_url)?;
            let factory = locate_factory(&chain, &store).await?;
            let factory = FactoryContract::new(&chain, factory);

            let mut pools = Vec::new();
            for address in factory.pools().await? {
                let state = PoolContract::new(&chain, address).state().await?;
                pools.push((address, state));
            }
            println!("{}", pools_table(&pools));
        }

        Command::DeployFactory => {
            let (network, chain, store) = connect(&config, &cli.network, cli.rpc_url)?;
            let signer = connect_signer(&chain, &network).await?;
            let deployer = ContractDeployer::new(
                TransactionSubmitter::new(&chain, &signer, config.submitter.clone()),
                &store,
            );

            let mut nonces = NonceManager::new(signer.address());
            let deployment = deployer
                .deploy_factory(&mut nonces, &config.artifacts_dir)
                .await
                .context("Failed to deploy StakingContractFactory")?;
            println!("StakingContractFactory deployed to: {}", deployment.address);
        }

        Command::DeployStakeFxd { token } => {
            let (network, chain, store) = connect(&config, &cli.network, cli.rpc_url)?;
            let tokens = load_tokens(&config, &network, &cli.network)?;
            let fxd = tokens.address(&token)?;

            let signer = connect_signer(&chain, &network).await?;
            let deployer = ContractDeployer::new(
                TransactionSubmitter::new(&chain, &signer, config.submitter.clone()),
                &store,
            );

            let mut nonces = NonceManager::new(signer.address());
            let deployment = deployer
                .deploy_stake_fxd(&mut nonces, &config.artifacts_dir, fxd)
                .await
                .context("Failed to deploy StakeFXD")?;
            println!("StakeFXD deployed to: {}", deployment.address);
        }

        Command::DeployPools {
            pools,
            verify,
            dry_run,
        } => {
            let (network, chain, store) = connect(&config, &cli.network, cli.rpc_url)?;
            let tokens = load_tokens(&config, &network, &cli.network)?;
            let pools = PoolList::load(&pools)?.resolve(&tokens)?;

            if dry_run {
                for pool in &pools {
                    println!("{}", serde_json::to_string_pretty(pool)?);
                }
                return Ok(());
            }

            // Fails before any transaction when the factory is missing.
            let factory = locate_factory(&chain, &store).await?;
            let signer = connect_signer(&chain, &network).await?;
            log_account(&chain, signer.address()).await?;

            let sequencer = PoolDeploymentSequencer::new(
                TransactionSubmitter::new(&chain, &signer, config.submitter.clone()),
                factory,
            )
            .verify_mode(verify);

            let mut nonces = NonceManager::new(signer.address());
            match sequencer.run(&mut nonces, &pools).await {
                Ok(report) => {
                    println!("{}", records_table(&report.records));
                    tracing::info!(
                        nonces = %nonce_range(&report.nonces),
                        pool_count = %report.pool_count_after,
                        "Deployment summary"
                    );
                }
                Err(failure) => {
                    if !failure.records.is_empty() {
                        println!("{}", records_table(&failure.records));
                    }
                    tracing::info!(nonces = %nonce_range(&failure.nonces), "Nonces used");
                    return Err(failure.into());
                }
            }
        }
    }

    Ok(())
}

/// Resolve the network, apply the RPC override and open the deployment store.
fn connect(
    config: &StakekitConfig,
    name: &str,
    rpc_url: Option<String>,
) -> Result<(NetworkConfig, RpcClient, DeploymentStore)> {
    let mut network = config.network(name)?.clone();
    if let Some(rpc_url) = rpc_url {
        network.rpc_url = rpc_url;
    }

    let chain = RpcClient::new(network.rpc_url()?)?;
    let store = DeploymentStore::new(&config.deployments_dir, name);

    tracing::info!(
        network = name,
        rpc_url = %network.rpc_url,
        chain_id = network.chain_id,
        "Using network"
    );
    Ok((network, chain, store))
}

/// Build the deployer's signer and check the endpoint serves the configured chain.
async fn connect_signer(chain: &RpcClient, network: &NetworkConfig) -> Result<TransactionSigner> {
    let chain_id = chain.chain_id().await.context("Failed to reach the RPC endpoint")?;
    if chain_id != network.chain_id {
        anyhow::bail!(
            "RPC endpoint serves chain {chain_id}, but the network is configured for chain {}",
            network.chain_id
        );
    }

    Ok(TransactionSigner::from_private_key(
        &network.private_key()?,
        chain_id,
    )?)
}

fn load_tokens(config: &StakekitConfig, network: &NetworkConfig, name: &str) -> Result<TokenConfig> {
    let token_config = network.token_config_name(name)?;
    TokenConfig::load(&config.configs_dir, &token_config)
        .with_context(|| format!("Failed to load token config for {name}"))
}

/// Load variables from a dotenv file when it exists.
///
/// Variables already set in the environment take precedence over the file.
fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}
