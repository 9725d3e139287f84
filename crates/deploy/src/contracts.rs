//! ABI bindings for the staking contracts and typed read access to them.

use alloy_core::primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue, sol};

use crate::{
    DecodeError, Result,
    chain::{CallRequest, ChainClient, TransactionReceipt},
    config::PoolConfig,
};

sol! {
    /// Factory that instantiates staking pools and tracks their addresses.
    interface IStakingContractFactory {
        event PoolDeployed(address pool);

        function deploy(address stakingToken, uint256 interest, uint256 decimals, string name) external returns (address pool);
        function getPoolCount() external view returns (uint256);
        function getPool(uint256 index) external view returns (address);
    }

    /// A single staking pool created by the factory.
    interface ITokenStaking {
        function initialize(
            uint256 minStakeAmount,
            uint256 maxStakeAmount,
            uint256 coolOff,
            uint256 redeemInterval,
            uint256 maxPoolAmount,
            uint256 interestPrecision
        ) external;

        function minStakeAmount() external view returns (uint256);
        function maxStakeAmount() external view returns (uint256);
        function coolOff() external view returns (uint256);
        function redeemInterval() external view returns (uint256);
        function maxPoolAmount() external view returns (uint256);
        function interest() external view returns (uint256);
        function stakingToken() external view returns (address);
        function poolName() external view returns (string);
    }
}

pub use IStakingContractFactory::PoolDeployed;

/// Calldata for `factory.deploy(token, interest, decimals, name)`.
pub fn create_pool_calldata(pool: &PoolConfig) -> Bytes {
    IStakingContractFactory::deployCall {
        stakingToken: pool.token_address,
        interest: U256::from(pool.interest),
        decimals: U256::from(pool.decimals),
        name: pool.name.clone(),
    }
    .abi_encode()
    .into()
}

/// Calldata for `pool.initialize(...)` with the pool's parameters.
pub fn initialize_calldata(pool: &PoolConfig) -> Bytes {
    ITokenStaking::initializeCall {
        minStakeAmount: U256::from(pool.min_stake_amount),
        maxStakeAmount: U256::from(pool.max_stake_amount),
        coolOff: U256::from(pool.cool_off),
        redeemInterval: U256::from(pool.redeem_interval),
        maxPoolAmount: U256::from(pool.max_pool_amount),
        interestPrecision: U256::from(pool.interest_precision),
    }
    .abi_encode()
    .into()
}

/// Constructor arguments of `StakeFXD(address fxd, uint256 version)`.
pub fn stake_fxd_constructor_args(fxd: Address, version: U256) -> Bytes {
    (fxd, version).abi_encode_params().into()
}

/// Find and decode the first `E` emitted by `emitter` in a receipt.
pub fn decode_event<E: SolEvent>(
    receipt: &TransactionReceipt,
    emitter: Address,
) -> std::result::Result<E, DecodeError> {
    let log = receipt
        .logs
        .iter()
        .find(|log| {
            log.address == emitter && log.topics.first() == Some(&E::SIGNATURE_HASH)
        })
        .ok_or(DecodeError::EventNotFound {
            event: E::SIGNATURE,
        })?;

    E::decode_log_data(&log.log_data()).map_err(|e| DecodeError::Abi {
        what: E::SIGNATURE,
        reason: e.to_string(),
    })
}

/// The address of the pool created by a factory `deploy` transaction.
pub fn decode_pool_deployed(
    receipt: &TransactionReceipt,
    factory: Address,
) -> std::result::Result<Address, DecodeError> {
    decode_event::<PoolDeployed>(receipt, factory).map(|event| event.pool)
}

async fn view<C: ChainClient>(chain: &C, to: Address, call: impl SolCall) -> Result<Bytes> {
    chain.call(&CallRequest::view(to, call.abi_encode())).await
}

fn decode_return<T>(what: &'static str, data: &[u8]) -> std::result::Result<T, DecodeError>
where
    T: SolValue + From<<T::SolType as alloy_sol_types::SolType>::RustType>,
{
    T::abi_decode(data).map_err(|e| DecodeError::Abi {
        what,
        reason: e.to_string(),
    })
}

/// Read access to a deployed `StakingContractFactory`.
pub struct FactoryContract<'a, C> {
    chain: &'a C,
    address: Address,
}

impl<'a, C: ChainClient> FactoryContract<'a, C> {
    pub fn new(chain: &'a C, address: Address) -> Self {
        Self { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn pool_count(&self) -> Result<U256> {
        let data = view(self.chain, self.address, IStakingContractFactory::getPoolCountCall {}).await?;
        Ok(decode_return::<U256>("getPoolCount", &data)?)
    }

    pub async fn pool(&self, index: U256) -> Result<Address> {
        let data = view(
            self.chain,
            self.address,
            IStakingContractFactory::getPoolCall { index },
        )
        .await?;
        Ok(decode_return::<Address>("getPool", &data)?)
    }

    /// Every pool registered in the factory, in creation order.
    pub async fn pools(&self) -> Result<Vec<Address>> {
        let count = self.pool_count().await?;
        let count: u64 = count.saturating_to();
        let mut pools = Vec::with_capacity(count as usize);
        for index in 0..count {
            pools.push(self.pool(U256::from(index)).await?);
        }
        Ok(pools)
    }
}

/// On-chain configuration of a staking pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub min_stake_amount: U256,
    pub max_stake_amount: U256,
    pub cool_off: U256,
    pub redeem_interval: U256,
    pub max_pool_amount: U256,
    pub interest: U256,
    pub staking_token: Address,
    pub pool_name: String,
}

/// Read access to a deployed `TokenStaking` pool.
pub struct PoolContract<'a, C> {
    chain: &'a C,
    address: Address,
}

macro_rules! uint_accessor {
    ($(#[$doc:meta])* $name:ident, $call:ident, $what:literal) => {
        $(#[$doc])*
        pub async fn $name(&self) -> Result<U256> {
            let data = view(self.chain, self.address, ITokenStaking::$call {}).await?;
            Ok(decode_return::<U256>($what, &data)?)
        }
    };
}

impl<'a, C: ChainClient> PoolContract<'a, C> {
    pub fn new(chain: &'a C, address: Address) -> Self {
        Self { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    uint_accessor!(min_stake_amount, minStakeAmountCall, "minStakeAmount");
    uint_accessor!(max_stake_amount, maxStakeAmountCall, "maxStakeAmount");
    uint_accessor!(
        /// Cool-off period in seconds.
        cool_off,
        coolOffCall,
        "coolOff"
    );
    uint_accessor!(
        /// Redeem interval in seconds.
        redeem_interval,
        redeemIntervalCall,
        "redeemInterval"
    );
    uint_accessor!(max_pool_amount, maxPoolAmountCall, "maxPoolAmount");
    uint_accessor!(interest, interestCall, "interest");

    pub async fn staking_token(&self) -> Result<Address> {
        let data = view(self.chain, self.address, ITokenStaking::stakingTokenCall {}).await?;
        Ok(decode_return::<Address>("stakingToken", &data)?)
    }

    pub async fn pool_name(&self) -> Result<String> {
        let data = view(self.chain, self.address, ITokenStaking::poolNameCall {}).await?;
        Ok(decode_return::<String>("poolName", &data)?)
    }

    /// Read every configured field.
    pub async fn state(&self) -> Result<PoolState> {
        Ok(PoolState {
            min_stake_amount: self.min_stake_amount().await?,
            max_stake_amount: self.max_stake_amount().await?,
            cool_off: self.cool_off().await?,
            redeem_interval: self.redeem_interval().await?,
            max_pool_amount: self.max_pool_amount().await?,
            interest: self.interest().await?,
            staking_token: self.staking_token().await?,
            pool_name: self.pool_name().await?,
        })
    }
}
