//! Live cluster implementation of the network interface
//!
//! One `RpcClient` for request/response calls and one `PubsubClient`
//! connection shared by every signature watch. Subscriptions are multiplexed
//! over that single websocket.

use super::{LedgerRpc, RpcManagerError, SignatureFeed, SignatureNotification};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;
use solana_client::nonblocking::{pubsub_client::PubsubClient, rpc_client::RpcClient};
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcSignatureSubscribeConfig};
use solana_rpc_client_api::response::RpcSignatureResult;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// RPC + websocket client pair for one cluster
pub struct SolanaNetwork {
    rpc: RpcClient,
    pubsub: Arc<PubsubClient>,
    rpc_url: String,
    ws_url: String,
    preflight_commitment: CommitmentConfig,
}

impl std::fmt::Debug for SolanaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaNetwork")
            .field("rpc_url", &self.rpc_url)
            .field("ws_url", &self.ws_url)
            .field("preflight_commitment", &self.preflight_commitment)
            .finish_non_exhaustive()
    }
}

impl SolanaNetwork {
    /// Connect both halves; fails if the websocket handshake fails
    pub async fn connect(
        rpc_url: &str,
        ws_url: &str,
        request_timeout: Duration,
        commitment: CommitmentConfig,
    ) -> Result<Self, RpcManagerError> {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            request_timeout,
            commitment,
        );
        let pubsub = PubsubClient::new(ws_url)
            .await
            .map_err(|e| RpcManagerError::from_pubsub_error(e, ws_url))?;

        info!(rpc_url = %rpc_url, ws_url = %ws_url, "Connected to cluster");

        Ok(Self {
            rpc,
            pubsub: Arc::new(pubsub),
            rpc_url: rpc_url.to_string(),
            ws_url: ws_url.to_string(),
            preflight_commitment: commitment,
        })
    }
}

#[async_trait]
impl LedgerRpc for SolanaNetwork {
    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Hash, RpcManagerError> {
        let (hash, _last_valid_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.rpc_url))?;
        Ok(hash)
    }

    #[instrument(skip(self, tx), fields(signature = ?tx.signatures.first()))]
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, RpcManagerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.preflight_commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        self.rpc
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.rpc_url))
    }

    async fn account_data(&self, pubkey: &Pubkey) -> Result<Vec<u8>, RpcManagerError> {
        let response = self
            .rpc
            .get_account_with_commitment(pubkey, self.rpc.commitment())
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.rpc_url))?;

        response
            .value
            .map(|account| account.data)
            .ok_or_else(|| RpcManagerError::AccountNotFound {
                account: pubkey.to_string(),
                endpoint: self.rpc_url.clone(),
            })
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcManagerError> {
        self.rpc
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.rpc_url))
    }

    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcManagerError> {
        self.rpc
            .request_airdrop(pubkey, lamports)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.rpc_url))
    }
}

#[async_trait]
impl SignatureFeed for SolanaNetwork {
    async fn next_notification(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
        deadline: Duration,
    ) -> Result<SignatureNotification, RpcManagerError> {
        let (mut notifications, unsubscribe) = self
            .pubsub
            .signature_subscribe(
                signature,
                Some(RpcSignatureSubscribeConfig {
                    commitment: Some(commitment),
                    enable_received_notification: Some(false),
                }),
            )
            .await
            .map_err(|e| RpcManagerError::from_pubsub_error(e, &self.ws_url))?;
        let subscription = SubscriptionGuard::new(unsubscribe);

        let waited = timeout(deadline, async {
            while let Some(response) = notifications.next().await {
                let slot = response.context.slot;
                match response.value {
                    RpcSignatureResult::ProcessedSignature(processed) => {
                        return Some(match processed.err {
                            None => SignatureNotification::Reached { slot },
                            Some(err) => SignatureNotification::ExecutionFailed {
                                slot,
                                reason: format!("{err:?}"),
                            },
                        });
                    }
                    RpcSignatureResult::ReceivedSignature(_) => {
                        debug!(signature = %signature, "Received-only notification skipped");
                    }
                }
            }
            None
        })
        .await;

        drop(notifications);
        subscription.release().await;

        match waited {
            Ok(Some(notification)) => Ok(notification),
            Ok(None) => Err(RpcManagerError::Subscription {
                endpoint: self.ws_url.clone(),
                message: format!("subscription for {signature} closed before a notification"),
            }),
            Err(_) => {
                debug!(signature = %signature, deadline_ms = deadline.as_millis() as u64, "Signature wait elapsed");
                Ok(SignatureNotification::DeadlineElapsed)
            }
        }
    }
}

/// Owns the unsubscribe call of one signature subscription
///
/// `release` awaits it in line; dropping an unreleased guard hands it to the
/// runtime so a cancelled wait never leaves the subscription open.
struct SubscriptionGuard<F>
where
    F: FnOnce() -> BoxFuture<'static, ()>,
{
    unsubscribe: Option<F>,
}

impl<F> SubscriptionGuard<F>
where
    F: FnOnce() -> BoxFuture<'static, ()>,
{
    fn new(unsubscribe: F) -> Self {
        Self {
            unsubscribe: Some(unsubscribe),
        }
    }

    async fn release(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe().await;
        }
    }
}

impl<F> Drop for SubscriptionGuard<F>
where
    F: FnOnce() -> BoxFuture<'static, ()>,
{
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(unsubscribe());
                }
                Err(_) => warn!("No runtime to release signature subscription"),
            }
        }
    }
}
