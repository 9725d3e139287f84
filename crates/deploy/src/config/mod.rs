//! Configuration sources of a deployment run.
//!
//! - [`StakekitConfig`]: the `Stakekit.toml` file layered with `STAKEKIT_*`
//!   environment variables (directories, submitter policy, networks).
//! - [`TokenConfig`]: per-network token addresses (`configs/<network>.json`).
//! - [`PoolList`]: the ordered list of pools to deploy, resolved into
//!   [`PoolConfig`]s against a token config.

mod network;
pub use network::{ENV_PREFIX, NetworkConfig, STAKEKIT_CONFIG_FILENAME, StakekitConfig};

mod pools;
pub use pools::{PoolConfig, PoolList, PoolSpec, TokenRef};

mod tokens;
pub use tokens::TokenConfig;
