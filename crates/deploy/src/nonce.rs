//! Local nonce bookkeeping for a single deployer account.

use alloy_core::primitives::Address;

use crate::{
    DeployError, Result,
    chain::{BlockTag, ChainClient},
};

/// Hands out nonces for one account within one run.
///
/// The counter is seeded from the chain's pending transaction count and only
/// advanced locally between chain reads. After a failed transaction the
/// manager is stale until the next [`NonceManager::refresh`], because the
/// chain may or may not have consumed the failed nonce.
#[derive(Debug, Clone)]
pub struct NonceManager {
    account: Address,
    next: Option<u64>,
    stale: bool,
    issued: Vec<u64>,
}

impl NonceManager {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            next: None,
            stale: true,
            issued: Vec::new(),
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Re-read the pending-inclusive transaction count from the chain.
    pub async fn refresh<C: ChainClient>(&mut self, chain: &C) -> Result<u64> {
        let nonce = chain
            .transaction_count(self.account, BlockTag::Pending)
            .await?;

        match self.next {
            Some(local) if local != nonce => {
                tracing::warn!(
                    account = %self.account,
                    local,
                    chain = nonce,
                    "Local nonce out of sync with chain, resyncing"
                );
            }
            _ => tracing::debug!(account = %self.account, nonce, "Nonce synced from chain"),
        }

        self.next = Some(nonce);
        self.stale = false;
        Ok(nonce)
    }

    /// Return the current nonce and advance the counter.
    pub fn next(&mut self) -> Result<u64> {
        let nonce = match self.next {
            Some(nonce) if !self.stale => nonce,
            _ => {
                return Err(DeployError::NonceStale {
                    account: self.account,
                });
            }
        };

        self.next = Some(nonce + 1);
        self.issued.push(nonce);
        Ok(nonce)
    }

    /// The nonce the next call to [`NonceManager::next`] would return.
    pub fn peek(&self) -> Option<u64> {
        if self.stale { None } else { self.next }
    }

    /// Mark the counter unusable until the next refresh.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Give back a nonce whose transaction never reached the node.
    ///
    /// The nonce is dropped from the issued log and the counter is stale until
    /// the next refresh.
    pub fn release(&mut self, nonce: u64) {
        if self.issued.last() == Some(&nonce) {
            self.issued.pop();
        }
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Every nonce handed out and not released, in order.
    pub fn issued(&self) -> &[u64] {
        &self.issued
    }
}
