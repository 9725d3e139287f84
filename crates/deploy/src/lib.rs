//! stakekit-deploy - Deployment library for the staking pool contracts.
//!
//! This crate deploys a `StakingContractFactory`, creates and initializes
//! staking pools through it, and keeps the deployer's nonce in sync with the
//! chain while doing so.

pub mod artifact;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod deployments;
pub mod report;
pub mod rpc;

mod deployer;
pub use deployer::{ContractDeployer, STAKE_FXD_VERSION, log_account};

mod error;
pub use error::{DecodeError, DeployError, Result};

mod nonce;
pub use nonce::NonceManager;

mod sequencer;
pub use sequencer::{
    DeploymentRecord, DeploymentReport, PoolDeploymentSequencer, PoolStatus, SequencerFailure,
    Step, VerifyMode, locate_factory,
};

mod signer;
pub use signer::{SignedTransaction, TransactionIntent, TransactionSigner};

mod submitter;
pub use submitter::{Call, SubmitterConfig, TransactionSubmitter};

pub use chain::{ChainClient, TransactionReceipt};
pub use config::{PoolConfig, PoolList, StakekitConfig, TokenConfig};
pub use deployments::{ContractDeployment, DeploymentStore, STAKE_FXD, STAKING_FACTORY};
pub use rpc::RpcClient;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
