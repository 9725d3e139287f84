//! In-memory chain simulating the staking factory and its pools.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use alloy_core::primitives::{Address, B256, Bytes, LogData, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};

use crate::{
    DeployError, Result,
    chain::{BlockTag, CallRequest, ChainClient, ReceiptLog, TransactionReceipt},
    contracts::{IStakingContractFactory, ITokenStaking, PoolDeployed},
    signer::{SignedTransaction, TransactionIntent},
};

/// Gas estimate returned for plain transfers.
pub const TRANSFER_GAS: u64 = 21_000;
/// Gas estimate returned for contract calls.
pub const CALL_GAS: u64 = 250_000;
/// Gas estimate returned for contract creation.
pub const CREATE_GAS: u64 = 2_000_000;

/// Init code prefix that makes a created contract behave as a staking factory.
pub const FACTORY_BYTECODE: &[u8] = b"\x60\x80mock-staking-factory";
const POOL_CODE: &[u8] = b"\x60\x80mock-token-staking";

#[derive(Debug, Clone, Default)]
struct MockPool {
    token: Address,
    name: String,
    interest: U256,
    initialized: bool,
    min_stake_amount: U256,
    max_stake_amount: U256,
    cool_off: U256,
    redeem_interval: U256,
    max_pool_amount: U256,
}

#[derive(Debug, Default)]
struct MockState {
    gas_price: u128,
    block_number: u64,
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    /// Factory address to the pools it created, in order.
    factories: HashMap<Address, Vec<Address>>,
    pools: HashMap<Address, MockPool>,
    receipts: HashMap<B256, TransactionReceipt>,
    sent: Vec<TransactionIntent>,
    rejections: VecDeque<String>,
    estimate_failures: VecDeque<String>,
    revert_initialize: bool,
    omit_pool_event: bool,
    corrupt_min_stake: bool,
    receipt_delay: u32,
    pending_polls: HashMap<B256, u32>,
    receipt_polls: u64,
}

/// A [`ChainClient`] backed by in-memory state.
///
/// Transactions are mined instantly (unless receipts are delayed) and must
/// carry exactly the sender's next nonce.
#[derive(Debug)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                gas_price: 1_000_000_000,
                ..Default::default()
            }),
        }
    }

    /// A chain with a factory already deployed at a fixed address.
    pub fn with_factory() -> (Self, Address) {
        let chain = Self::new();
        let factory = Address::repeat_byte(0xfa);
        chain.install_factory(factory);
        (chain, factory)
    }

    pub fn install_factory(&self, address: Address) {
        let mut state = self.state();
        state
            .code
            .insert(address, Bytes::from_static(FACTORY_BYTECODE));
        state.factories.entry(address).or_default();
    }

    pub fn set_nonce(&self, account: Address, nonce: u64) {
        self.state().nonces.insert(account, nonce);
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state().gas_price = gas_price;
    }

    /// Reject the next broadcast with the given node message.
    pub fn reject_next_send(&self, reason: &str) {
        self.state().rejections.push_back(reason.to_string());
    }

    /// Fail the next gas estimate with the given node message.
    pub fn fail_next_estimate(&self, reason: &str) {
        self.state().estimate_failures.push_back(reason.to_string());
    }

    /// Make every `initialize` call revert.
    pub fn revert_initialize(&self, revert: bool) {
        self.state().revert_initialize = revert;
    }

    /// Create pools without emitting `PoolDeployed`.
    pub fn omit_pool_event(&self, omit: bool) {
        self.state().omit_pool_event = omit;
    }

    /// Store zero as the minimum stake regardless of the initialize arguments.
    pub fn corrupt_min_stake(&self, corrupt: bool) {
        self.state().corrupt_min_stake = corrupt;
    }

    /// Report each new transaction as pending for `polls` receipt polls.
    pub fn delay_receipts(&self, polls: u32) {
        self.state().receipt_delay = polls;
    }

    /// Intents of every transaction accepted so far.
    pub fn sent(&self) -> Vec<TransactionIntent> {
        self.state().sent.clone()
    }

    pub fn receipt_polls(&self) -> u64 {
        self.state().receipt_polls
    }

    /// Pools created by `factory`, in order.
    pub fn pools_of(&self, factory: Address) -> Vec<Address> {
        self.state()
            .factories
            .get(&factory)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_initialized(&self, pool: Address) -> bool {
        self.state()
            .pools
            .get(&pool)
            .is_some_and(|p| p.initialized)
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.state().code.contains_key(&address)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock chain state poisoned")
    }
}

impl MockState {
    fn apply(&mut self, tx: &SignedTransaction) -> Result<B256> {
        let intent = &tx.intent;
        let reject = |reason: String| DeployError::Submission {
            nonce: Some(intent.nonce),
            reason,
        };

        if let Some(reason) = self.rejections.pop_front() {
            return Err(reject(reason));
        }

        let expected = self.nonces.get(&tx.from).copied().unwrap_or(0);
        if intent.nonce < expected {
            return Err(reject(format!(
                "nonce too low: next nonce {expected}, tx nonce {}",
                intent.nonce
            )));
        }
        if intent.nonce > expected {
            return Err(reject(format!(
                "nonce too high: next nonce {expected}, tx nonce {}",
                intent.nonce
            )));
        }

        self.nonces.insert(tx.from, expected + 1);
        self.block_number += 1;

        let (status, contract_address, logs) = self.execute(tx);
        self.receipts.insert(
            tx.hash,
            TransactionReceipt {
                transaction_hash: tx.hash,
                block_number: Some(self.block_number),
                status: Some(status),
                contract_address,
                logs,
            },
        );
        self.pending_polls.insert(tx.hash, self.receipt_delay);
        self.sent.push(intent.clone());

        Ok(tx.hash)
    }

    fn execute(&mut self, tx: &SignedTransaction) -> (u64, Option<Address>, Vec<ReceiptLog>) {
        let intent = &tx.intent;
        match intent.to {
            None => {
                let address = tx.from.create(intent.nonce);
                self.code.insert(address, intent.payload.clone());
                if intent.payload.starts_with(FACTORY_BYTECODE) {
                    self.factories.insert(address, Vec::new());
                }
                (1, Some(address), Vec::new())
            }
            Some(to) if self.factories.contains_key(&to) => {
                let (status, logs) = self.call_factory(to, &intent.payload);
                (status, None, logs)
            }
            Some(to) if self.pools.contains_key(&to) => (self.call_pool(to, &intent.payload), None, Vec::new()),
            Some(_) if intent.payload.is_empty() => (1, None, Vec::new()),
            Some(_) => (0, None, Vec::new()),
        }
    }

    fn call_factory(&mut self, factory: Address, data: &[u8]) -> (u64, Vec<ReceiptLog>) {
        let Ok(call) = IStakingContractFactory::deployCall::abi_decode(data) else {
            return (0, Vec::new());
        };

        let Some(pools) = self.factories.get_mut(&factory) else {
            return (0, Vec::new());
        };
        let pool = factory.create(pools.len() as u64 + 1);
        pools.push(pool);

        self.pools.insert(
            pool,
            MockPool {
                token: call.stakingToken,
                name: call.name,
                interest: call.interest,
                ..Default::default()
            },
        );
        self.code.insert(pool, Bytes::from_static(POOL_CODE));

        let logs = if self.omit_pool_event {
            Vec::new()
        } else {
            vec![receipt_log(factory, PoolDeployed { pool }.encode_log_data())]
        };
        (1, logs)
    }

    fn call_pool(&mut self, address: Address, data: &[u8]) -> u64 {
        let Ok(call) = ITokenStaking::initializeCall::abi_decode(data) else {
            return 0;
        };
        let corrupt = self.corrupt_min_stake;
        let revert = self.revert_initialize;

        let Some(pool) = self.pools.get_mut(&address) else {
            return 0;
        };
        if revert || pool.initialized {
            return 0;
        }

        pool.initialized = true;
        pool.min_stake_amount = if corrupt { U256::ZERO } else { call.minStakeAmount };
        pool.max_stake_amount = call.maxStakeAmount;
        pool.cool_off = call.coolOff;
        pool.redeem_interval = call.redeemInterval;
        pool.max_pool_amount = call.maxPoolAmount;
        1
    }

    fn view(&self, to: Address, data: &[u8]) -> Result<Bytes> {
        let reverted = || DeployError::Rpc {
            method: "eth_call".to_string(),
            reason: "execution reverted".to_string(),
        };
        let selector = data.get(..4).ok_or_else(reverted)?;

        if let Some(pools) = self.factories.get(&to) {
            if selector == IStakingContractFactory::getPoolCountCall::SELECTOR {
                return Ok(U256::from(pools.len()).abi_encode().into());
            }
            if selector == IStakingContractFactory::getPoolCall::SELECTOR {
                let call = IStakingContractFactory::getPoolCall::abi_decode(data)
                    .map_err(|_| reverted())?;
                let index: usize = call.index.saturating_to();
                return pools
                    .get(index)
                    .map(|pool| pool.abi_encode().into())
                    .ok_or_else(reverted);
            }
            return Err(reverted());
        }

        let pool = self.pools.get(&to).ok_or_else(reverted)?;
        let encoded = if selector == ITokenStaking::minStakeAmountCall::SELECTOR {
            pool.min_stake_amount.abi_encode()
        } else if selector == ITokenStaking::maxStakeAmountCall::SELECTOR {
            pool.max_stake_amount.abi_encode()
        } else if selector == ITokenStaking::coolOffCall::SELECTOR {
            pool.cool_off.abi_encode()
        } else if selector == ITokenStaking::redeemIntervalCall::SELECTOR {
            pool.redeem_interval.abi_encode()
        } else if selector == ITokenStaking::maxPoolAmountCall::SELECTOR {
            pool.max_pool_amount.abi_encode()
        } else if selector == ITokenStaking::interestCall::SELECTOR {
            pool.interest.abi_encode()
        } else if selector == ITokenStaking::stakingTokenCall::SELECTOR {
            pool.token.abi_encode()
        } else if selector == ITokenStaking::poolNameCall::SELECTOR {
            pool.name.abi_encode()
        } else {
            return Err(reverted());
        };
        Ok(encoded.into())
    }
}

fn receipt_log(address: Address, data: LogData) -> ReceiptLog {
    ReceiptLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(super::fixtures::CHAIN_ID)
    }

    async fn transaction_count(&self, address: Address, _tag: BlockTag) -> Result<u64> {
        Ok(self.state().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.state().gas_price)
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        Ok(U256::from(100_000_000_000_000_000_000u128))
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        if let Some(reason) = self.state().estimate_failures.pop_front() {
            return Err(DeployError::Rpc {
                method: "eth_estimateGas".to_string(),
                reason,
            });
        }

        Ok(match request.to {
            None => CREATE_GAS,
            Some(_) if request.data.is_empty() => TRANSFER_GAS,
            Some(_) => CALL_GAS,
        })
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        let to = request.to.ok_or_else(|| DeployError::Rpc {
            method: "eth_call".to_string(),
            reason: "missing call target".to_string(),
        })?;
        self.state().view(to, &request.data)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<B256> {
        self.state().apply(tx)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let mut state = self.state();
        state.receipt_polls += 1;

        if let Some(remaining) = state.pending_polls.get_mut(&hash) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(state.receipts.get(&hash).cloned())
    }
}
