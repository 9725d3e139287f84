//! Error taxonomy for deployment runs.

use std::path::PathBuf;

use alloy_core::primitives::{Address, B256};
use thiserror::Error;

/// Result alias used throughout the deployment library.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

/// Messages a node returns when a transaction's nonce no longer matches the
/// account's pending nonce.
const STALE_NONCE_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "already known",
    "replacement transaction underpriced",
    "invalid nonce",
];

/// Errors that abort a deployment run.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The transaction never made it into a block.
    #[error("transaction not included{}: {reason}", fmt_nonce(.nonce))]
    Submission { nonce: Option<u64>, reason: String },

    /// The transaction was included but the application-level effect is missing.
    #[error("transaction {} reverted: {reason}", fmt_hash(.tx_hash))]
    Revert { tx_hash: Option<B256>, reason: String },

    /// On-chain state does not match what the run intended to write.
    #[error("verification failed for {field} at {address}: expected {expected}, got {actual}")]
    Verification {
        field: &'static str,
        address: Address,
        expected: String,
        actual: String,
    },

    /// Missing or malformed configuration, raised before any transaction is sent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A deployment record could not be written. The contract is already on
    /// chain at `address`.
    #[error("contract deployed at {address} but its record {} could not be saved: {reason}", .path.display())]
    Store {
        path: PathBuf,
        address: Address,
        reason: String,
    },

    /// The local nonce counter was used without being synced from chain.
    #[error("nonce for {account} must be refreshed from chain before use")]
    NonceStale { account: Address },

    /// Transport or node failure on a read call.
    #[error("rpc error calling {method}: {reason}")]
    Rpc { method: String, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Typed decode failures for events and return data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("event {event} not found in receipt logs")]
    EventNotFound { event: &'static str },

    #[error("failed to decode {what}: {reason}")]
    Abi { what: &'static str, reason: String },
}

impl DeployError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this is a pre-inclusion rejection caused by a nonce that is out
    /// of sync with the chain.
    pub fn is_stale_nonce(&self) -> bool {
        match self {
            Self::Submission { reason, .. } => {
                let reason = reason.to_lowercase();
                STALE_NONCE_MARKERS.iter().any(|m| reason.contains(m))
            }
            Self::NonceStale { .. } => true,
            _ => false,
        }
    }
}

fn fmt_nonce(nonce: &Option<u64>) -> String {
    nonce.map(|n| format!(" (nonce {n})")).unwrap_or_default()
}

fn fmt_hash(hash: &Option<B256>) -> String {
    hash.map(|h| h.to_string()).unwrap_or_else(|| "<unsent>".to_string())
}
