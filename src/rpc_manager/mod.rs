//! RPC Manager Module
//!
//! The narrow network interface the orchestration core talks through:
//! - `LedgerRpc`: request/response calls (blockhash, submit, account reads,
//!   rent queries, airdrops)
//! - `SignatureFeed`: signature-status notifications over the shared pub/sub
//!   connection
//!
//! `SolanaNetwork` implements both against a live cluster; tests use the
//! in-memory `MockNetwork` from `test_utils`.

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::time::Duration;

pub mod rpc_errors;
mod solana_network;

pub use rpc_errors::RpcManagerError;
pub use solana_network::SolanaNetwork;

/// One signature-status notification at the requested commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureNotification {
    /// The unit reached the requested commitment and executed successfully
    Reached { slot: u64 },
    /// The unit landed but on-chain execution failed
    ExecutionFailed { slot: u64, reason: String },
    /// Nothing arrived before the deadline; the unit may still land
    DeadlineElapsed,
}

/// Request/response half of the network interface
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetch a recent blockhash at `commitment`
    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Hash, RpcManagerError>;

    /// Transmit a signed transaction; `Ok` means the node accepted it, not that it landed
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, RpcManagerError>;

    /// Raw account data, `AccountNotFound` when the account does not exist
    async fn account_data(&self, pubkey: &Pubkey) -> Result<Vec<u8>, RpcManagerError>;

    /// Minimum lamports for a rent-exempt account of `data_len` bytes
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcManagerError>;

    /// Ask the cluster faucet for `lamports`
    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcManagerError>;
}

/// Pub/sub half of the network interface
///
/// Only the confirmation tracker and the synchronous submit path call this;
/// every call owns its subscription from open to unsubscribe. The
/// subscription is released when the call returns, including on
/// `DeadlineElapsed`, and when the returned future is dropped early.
#[async_trait]
pub trait SignatureFeed: Send + Sync {
    /// Subscribe to `signature`, wait up to `deadline` for the first
    /// notification at `commitment`, then unsubscribe
    async fn next_notification(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
        deadline: Duration,
    ) -> Result<SignatureNotification, RpcManagerError>;
}
