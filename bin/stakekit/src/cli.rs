use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stakekit_deploy::VerifyMode;
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "hardhat";

#[derive(Parser)]
#[command(name = "stakekit")]
#[command(
    author,
    version,
    about = "Deploy the staking factory and its pools with a consistent nonce sequence"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STAKEKIT_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// The network to deploy to, as named in the configuration.
    #[arg(short, long, env = "STAKEKIT_NETWORK", default_value = DEFAULT_NETWORK, global = true)]
    pub network: String,

    /// Path to a Stakekit.toml file, or to the directory containing it.
    ///
    /// If not provided, ./Stakekit.toml is used when it exists.
    #[arg(long, alias = "conf", env = "STAKEKIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the RPC endpoint of the selected network.
    #[arg(long, alias = "rpc", env = "STAKEKIT_RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy the StakingContractFactory and record its address.
    DeployFactory,

    /// Create, initialize and verify every pool of a pool list through the factory.
    DeployPools {
        /// TOML file with the `[[pools]]` to deploy, in order.
        #[arg(long, env = "STAKEKIT_POOLS")]
        pools: PathBuf,

        /// How much of each pool's configuration to read back.
        #[arg(long, env = "STAKEKIT_VERIFY", default_value_t = VerifyMode::Full)]
        verify: VerifyMode,

        /// Resolve and print the pools without sending any transaction.
        #[arg(long)]
        dry_run: bool,
    },

    /// Deploy StakeFXD with the FXD token of the network.
    DeployStakeFxd {
        /// Symbol of the FXD token in the token config.
        #[arg(long, env = "STAKEKIT_FXD_TOKEN", default_value = "FXD")]
        token: String,
    },

    /// List the pools registered in the deployed factory.
    Pools,

    /// Print the effective configuration.
    Config,
}
