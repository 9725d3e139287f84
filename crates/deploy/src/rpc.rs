//! JSON-RPC transport and the [`ChainClient`] implementation over it.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U128, U256};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::{
    DeployError, Result,
    chain::{BlockTag, CallRequest, ChainClient, TransactionReceipt},
    signer::SignedTransaction,
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| DeployError::Rpc {
            method: "<client>".to_string(),
            reason: format!("failed to create HTTP client: {e}"),
        })
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Error responses from the node are returned as [`DeployError::Rpc`] carrying
/// the node's message, so callers can classify rejections.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T> {
    let rpc_error = |reason: String| DeployError::Rpc {
        method: method.to_string(),
        reason,
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| rpc_error(format!("failed to send request: {e}")))?;

    let result: Value = response
        .json()
        .await
        .map_err(|e| rpc_error(format!("failed to parse response: {e}")))?;

    if let Some(error) = result.get("error") {
        return Err(rpc_error(
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        ));
    }

    let result_value = result
        .get("result")
        .cloned()
        .ok_or_else(|| rpc_error("no result in response".to_string()))?;

    serde_json::from_value(result_value)
        .map_err(|e| rpc_error(format!("failed to deserialize result: {e}")))
}

/// Deserialize an optional u64 from a hex string, accepting `null`.
pub fn deserialize_opt_u64_from_hex<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.as_deref()
        .map(parse_hex_u64)
        .transpose()
        .map_err(serde::de::Error::custom)
}

fn parse_hex_u64(s: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// A [`ChainClient`] talking to an Ethereum JSON-RPC endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        tracing::trace!(method, url = %self.url, "JSON-RPC request");
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }
}

impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64> {
        let count: U64 = self
            .request(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!(tag.to_string())],
            )
            .await?;
        Ok(count.to::<u64>())
    }

    async fn gas_price(&self) -> Result<u128> {
        let price: U128 = self.request("eth_gasPrice", vec![]).await?;
        Ok(price.to::<u128>())
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.request(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        self.request(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let gas: U64 = self
            .request("eth_estimateGas", vec![serde_json::json!(request)])
            .await?;
        Ok(gas.to::<u64>())
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.request(
            "eth_call",
            vec![serde_json::json!(request), serde_json::json!("latest")],
        )
        .await
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<B256> {
        self.request("eth_sendRawTransaction", vec![serde_json::json!(tx.raw)])
            .await
            .map_err(|e| match e {
                DeployError::Rpc { reason, .. } => DeployError::Submission {
                    nonce: Some(tx.intent.nonce),
                    reason,
                },
                other => other,
            })
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }
}
