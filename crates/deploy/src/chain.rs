//! The narrow chain interface the orchestrator submits transactions through.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, LogData, U256};
use serde::{Deserialize, Serialize};

use crate::{Result, rpc, signer::SignedTransaction};

/// Block tag used for state reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BlockTag {
    Latest,
    /// Includes transactions sitting in the node's mempool.
    Pending,
}

/// A log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl ReceiptLog {
    pub fn log_data(&self) -> LogData {
        LogData::new_unchecked(self.topics.clone(), self.data.clone())
    }
}

/// The subset of `eth_getTransactionReceipt` the orchestrator relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, deserialize_with = "rpc::deserialize_opt_u64_from_hex")]
    pub block_number: Option<u64>,
    /// `1` on success, `0` on revert. Absent on pre-Byzantium chains.
    #[serde(default, deserialize_with = "rpc::deserialize_opt_u64_from_hex")]
    pub status: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|s| s == 1)
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_number.is_some()
    }
}

/// Parameters for `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

impl CallRequest {
    /// A read-only call against a contract.
    pub fn view(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }
}

/// Chain access required by the deployment workflow.
///
/// Implemented over JSON-RPC by [`crate::RpcClient`]; the `testkit` feature
/// provides an in-memory implementation.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The number of transactions sent from `address`, as seen at `tag`.
    fn transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// The node's suggested gas price in wei.
    fn gas_price(&self) -> impl Future<Output = Result<u128>> + Send;

    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    fn code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    fn estimate_gas(&self, request: &CallRequest) -> impl Future<Output = Result<u64>> + Send;

    fn call(&self, request: &CallRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Broadcast a signed transaction. Rejections are reported as
    /// [`crate::DeployError::Submission`].
    fn send_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> impl Future<Output = Result<B256>> + Send;

    /// `None` while the transaction is unknown or still pending.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;
}
