//! Canonical test fixtures.

use alloy_core::primitives::Address;

use crate::{TransactionSigner, config::PoolConfig};

/// First default account of anvil/hardhat. Never holds real funds.
pub const DEPLOYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Chain id used by [`super::MockChain`].
pub const CHAIN_ID: u64 = 1337;

pub fn signer() -> TransactionSigner {
    TransactionSigner::from_private_key(DEPLOYER_KEY, CHAIN_ID)
        .expect("dev key is a valid secp256k1 key")
}

pub fn deployer_address() -> Address {
    signer().address()
}

/// The XDC pool: 7% interest, 18 decimals.
pub fn xdc_pool(token: Address) -> PoolConfig {
    PoolConfig {
        token_address: token,
        name: "XDC Premium Pool".to_string(),
        min_stake_amount: 10_000,
        max_stake_amount: 1_000_000,
        cool_off: 259_200,
        redeem_interval: 43_200,
        max_pool_amount: 5_000_000,
        interest_precision: 1_000_000,
        interest: 7,
        decimals: 18,
    }
}

/// CGO, FXD and XDC pools, in deployment order.
pub fn all_pools(cgo: Address, fxd: Address, xdc: Address) -> Vec<PoolConfig> {
    vec![
        PoolConfig {
            token_address: cgo,
            name: "CGO Staking Pool B".to_string(),
            min_stake_amount: 1_000,
            max_stake_amount: 500_000,
            cool_off: 172_800,
            redeem_interval: 43_200,
            max_pool_amount: 2_000_000,
            interest_precision: 1_000_000,
            interest: 15,
            decimals: 18,
        },
        PoolConfig {
            token_address: fxd,
            name: "FXD Growth Pool".to_string(),
            min_stake_amount: 5_000,
            max_stake_amount: 500_000,
            cool_off: 172_800,
            redeem_interval: 43_200,
            max_pool_amount: 2_000_000,
            interest_precision: 1_000_000,
            interest: 12,
            decimals: 18,
        },
        xdc_pool(xdc),
    ]
}
