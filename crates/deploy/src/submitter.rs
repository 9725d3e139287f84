//! Transaction submission: pricing, signing, broadcasting and confirmation.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::{
    DeployError, NonceManager, Result,
    chain::{CallRequest, ChainClient, TransactionReceipt},
    signer::{TransactionIntent, TransactionSigner},
};

/// Default gas price multiplier, in percent of the node's suggestion.
pub const DEFAULT_GAS_PRICE_MULTIPLIER_PCT: u64 = 200;
/// Lowest accepted gas price multiplier: twice the node's suggestion.
pub const MIN_GAS_PRICE_MULTIPLIER_PCT: u64 = 200;
/// Default headroom added on top of `eth_estimateGas`, in percent.
pub const DEFAULT_GAS_LIMIT_MARGIN_PCT: u64 = 20;
/// Default upper bound on waiting for a transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;
/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Gas and confirmation policy for submitted transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitterConfig {
    /// Gas price paid, as a percentage of `eth_gasPrice`. Must be at least 200.
    ///
    /// Over-paying keeps deployment transactions from getting stuck behind
    /// competing pending transactions.
    pub gas_price_multiplier_pct: u64,
    /// Headroom added on top of the gas estimate, in percent.
    pub gas_limit_margin_pct: u64,
    /// Fixed gas limit. Skips estimation when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            gas_price_multiplier_pct: DEFAULT_GAS_PRICE_MULTIPLIER_PCT,
            gas_limit_margin_pct: DEFAULT_GAS_LIMIT_MARGIN_PCT,
            gas_limit: None,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SubmitterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gas_price_multiplier_pct < MIN_GAS_PRICE_MULTIPLIER_PCT {
            return Err(DeployError::config(format!(
                "gas_price_multiplier_pct must be at least {MIN_GAS_PRICE_MULTIPLIER_PCT}, got {}",
                self.gas_price_multiplier_pct
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(DeployError::config("poll_interval_ms must be non-zero"));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(DeployError::config(
                "confirmation_timeout_secs must be non-zero",
            ));
        }
        Ok(())
    }

    /// Apply the multiplier to a suggested gas price.
    pub fn gas_price(&self, suggested: u128) -> u128 {
        suggested.saturating_mul(u128::from(self.gas_price_multiplier_pct)) / 100
    }

    /// Apply the safety margin to a gas estimate.
    pub fn gas_limit_with_margin(&self, estimate: u64) -> u64 {
        estimate.saturating_add(estimate.saturating_mul(self.gas_limit_margin_pct) / 100)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// What to send, before a nonce and gas price are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Option<Address>,
    pub value: U256,
    pub payload: Bytes,
}

impl Call {
    /// A plain value transfer.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value,
            payload: Bytes::new(),
        }
    }

    /// A zero-value contract call.
    pub fn contract(to: Address, payload: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            value: U256::ZERO,
            payload: payload.into(),
        }
    }

    /// A contract creation carrying init code.
    pub fn create(init_code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            value: U256::ZERO,
            payload: init_code.into(),
        }
    }
}

/// Outcome of one receipt poll.
#[derive(Debug)]
enum ReceiptPoll {
    Pending,
    Failed(DeployError),
}

/// Submits one transaction at a time and blocks until it is mined.
///
/// No submission is ever retried here; on failure the caller decides what to
/// do, after resyncing its [`NonceManager`].
pub struct TransactionSubmitter<'a, C> {
    chain: &'a C,
    signer: &'a TransactionSigner,
    config: SubmitterConfig,
}

impl<'a, C: ChainClient> TransactionSubmitter<'a, C> {
    pub fn new(chain: &'a C, signer: &'a TransactionSigner, config: SubmitterConfig) -> Self {
        Self {
            chain,
            signer,
            config,
        }
    }

    pub fn chain(&self) -> &'a C {
        self.chain
    }

    pub fn signer(&self) -> &'a TransactionSigner {
        self.signer
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// Attach gas price and gas limit to a call at the given nonce.
    pub async fn prepare(&self, call: Call, nonce: u64) -> Result<TransactionIntent> {
        let suggested = self.chain.gas_price().await?;
        let gas_price = self.config.gas_price(suggested);

        let gas_limit = match self.config.gas_limit {
            Some(limit) => limit,
            None => {
                let request = CallRequest {
                    from: Some(self.signer.address()),
                    to: call.to,
                    value: Some(call.value),
                    data: call.payload.clone(),
                };
                let estimate = self
                    .chain
                    .estimate_gas(&request)
                    .await
                    .map_err(|e| classify_estimate_error(e, nonce))?;
                self.config.gas_limit_with_margin(estimate)
            }
        };

        Ok(TransactionIntent {
            to: call.to,
            value: call.value,
            nonce,
            gas_price,
            gas_limit,
            payload: call.payload,
        })
    }

    /// Sign and broadcast an intent, then wait until it is mined.
    ///
    /// A mined transaction with a failed status is a [`DeployError::Revert`].
    pub async fn submit(&self, intent: TransactionIntent) -> Result<TransactionReceipt> {
        let nonce = intent.nonce;
        let tx_hash = self.broadcast(intent).await?;
        self.confirm(nonce, tx_hash).await
    }

    /// Sign and hand the transaction to the node. An error here means the node
    /// never accepted it, so its nonce is still free.
    async fn broadcast(&self, intent: TransactionIntent) -> Result<B256> {
        let nonce = intent.nonce;
        let gas_price = intent.gas_price;
        let signed = self.signer.sign(intent)?;

        let tx_hash = self.chain.send_transaction(&signed).await?;
        tracing::info!(nonce, gas_price, tx_hash = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn confirm(&self, nonce: u64, tx_hash: B256) -> Result<TransactionReceipt> {
        let receipt = self.wait_for_confirmation(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(DeployError::Revert {
                tx_hash: Some(tx_hash),
                reason: "execution reverted (receipt status 0)".to_string(),
            });
        }

        tracing::info!(
            nonce,
            tx_hash = %tx_hash,
            block = receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    /// Send a call at the next local nonce.
    ///
    /// Any failure leaves `nonces` stale, so the caller has to refresh it from
    /// chain before sending anything else. A nonce whose transaction the node
    /// never accepted is released from the issued log.
    pub async fn send(&self, nonces: &mut NonceManager, call: Call) -> Result<TransactionReceipt> {
        let nonce = nonces.next()?;

        let broadcast = match self.prepare(call, nonce).await {
            Ok(intent) => self.broadcast(intent).await,
            Err(e) => Err(e),
        };
        let tx_hash = match broadcast {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                tracing::warn!(nonce, error = %e, "Transaction not sent, nonce must be resynced");
                nonces.release(nonce);
                return Err(e);
            }
        };

        let result = self.confirm(nonce, tx_hash).await;
        if let Err(e) = &result {
            tracing::warn!(nonce, error = %e, "Transaction failed, nonce must be resynced");
            nonces.invalidate();
        }
        result
    }

    /// Send a zero-value transfer to self at the current pending nonce.
    ///
    /// This consumes a nonce that a previous interrupted run may have left
    /// queued. A stale-nonce rejection is tolerated: the counter is resynced and
    /// the run continues. The manager is always refreshed before returning.
    pub async fn clear_pending_nonce(&self, nonces: &mut NonceManager) -> Result<()> {
        let start = nonces.refresh(self.chain).await?;
        tracing::info!(nonce = start, "Sending clearing transaction...");

        match self
            .send(nonces, Call::transfer(self.signer.address(), U256::ZERO))
            .await
        {
            Ok(receipt) => {
                tracing::info!(tx_hash = %receipt.transaction_hash, "Clearing transaction confirmed");
            }
            Err(e) if e.is_stale_nonce() => {
                tracing::warn!(error = %e, "Clearing transaction rejected, resyncing nonce");
            }
            Err(e) => return Err(e),
        }

        let nonce = nonces.refresh(self.chain).await?;
        tracing::info!(nonce, "Nonce after clearing");
        Ok(())
    }

    /// Poll for the receipt until it is mined or the confirmation timeout elapses.
    pub async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let timeout = self.config.confirmation_timeout();
        let interval = self.config.poll_interval();
        let max_polls = (timeout.as_millis() / interval.as_millis().max(1)) as usize + 1;

        let backoff = ConstantBuilder::default()
            .with_delay(interval)
            .with_max_times(max_polls);

        let polled = tokio::time::timeout(
            timeout,
            (|| self.poll_receipt(tx_hash))
                .retry(backoff)
                .notify(|poll: &ReceiptPoll, _| {
                    if let ReceiptPoll::Failed(e) = poll {
                        tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed, retrying");
                    }
                }),
        )
        .await;

        match polled {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(ReceiptPoll::Failed(e))) => Err(e),
            Ok(Err(ReceiptPoll::Pending)) | Err(_) => Err(DeployError::Submission {
                nonce: None,
                reason: format!(
                    "transaction {tx_hash} not confirmed within {}s",
                    timeout.as_secs()
                ),
            }),
        }
    }

    async fn poll_receipt(&self, tx_hash: B256) -> std::result::Result<TransactionReceipt, ReceiptPoll> {
        match self.chain.transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt.is_confirmed() => Ok(receipt),
            Ok(_) => Err(ReceiptPoll::Pending),
            Err(e) => Err(ReceiptPoll::Failed(e)),
        }
    }
}

/// Map a gas estimation failure: a simulated revert is an application-level
/// failure, anything else means the transaction could not be sent.
fn classify_estimate_error(err: DeployError, nonce: u64) -> DeployError {
    match err {
        DeployError::Rpc { reason, .. } if reason.to_lowercase().contains("revert") => {
            DeployError::Revert {
                tx_hash: None,
                reason: format!("gas estimation failed: {reason}"),
            }
        }
        DeployError::Rpc { reason, .. } => DeployError::Submission {
            nonce: Some(nonce),
            reason: format!("gas estimation failed: {reason}"),
        },
        other => other,
    }
}
