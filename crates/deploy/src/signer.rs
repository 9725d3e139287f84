//! Local transaction signing for the deployer account.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::{DeployError, Result};

/// A transaction fully specified by the orchestrator.
///
/// Submitted once and tracked until confirmation or failure; a failed intent
/// is never resent with the same nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIntent {
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub payload: Bytes,
}

/// A signed, ready-to-broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub intent: TransactionIntent,
    pub from: Address,
    pub hash: B256,
    /// EIP-2718 encoded bytes for `eth_sendRawTransaction`.
    pub raw: Bytes,
}

/// Signs legacy (gas-price) transactions with the deployer's key.
///
/// Legacy transactions are used because the gas policy is expressed as a
/// multiple of `eth_gasPrice`, and because they are accepted by chains that
/// never activated EIP-1559.
#[derive(Debug, Clone)]
pub struct TransactionSigner {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl TransactionSigner {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }

    /// Build a signer from a hex private key (with or without `0x`).
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| DeployError::config(format!("invalid deployer private key: {e}")))?;
        Ok(Self::new(signer, chain_id))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sign(&self, intent: TransactionIntent) -> Result<SignedTransaction> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: intent.nonce,
            gas_price: intent.gas_price,
            gas_limit: intent.gas_limit,
            to: intent.to.map_or(TxKind::Create, TxKind::Call),
            value: intent.value,
            input: intent.payload.clone(),
        };

        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| DeployError::Submission {
                nonce: Some(intent.nonce),
                reason: format!("failed to sign transaction: {e}"),
            })?;

        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::Legacy(signed).encoded_2718();

        Ok(SignedTransaction {
            intent,
            from: self.address(),
            hash,
            raw: raw.into(),
        })
    }
}
