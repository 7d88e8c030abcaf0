//! Submission engine
//!
//! Two ways to send a `SignedUnit`:
//! - `submit_and_await`: send, then wait for the requested commitment
//! - `submit_and_track`: send, hand the signature to the tracker, return
//!
//! `execute_sync` / `execute_async` wrap either mode with a fresh blockhash,
//! build and sign, and rebuild when the node rejects an expired blockhash.

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{LedgerRpc, RpcManagerError, SignatureFeed, SignatureNotification};
use crate::submit::errors::SubmitError;
use crate::submit::tracker::{record_result, ConfirmationResult, ConfirmationTracker};
use crate::tx_builder::{SignedUnit, SignerResolver, TxDraft};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, instruction::Instruction, pubkey::Pubkey,
    signature::Signature,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{info, instrument, warn};

/// Tunables for one engine instance
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    /// Commitment `execute_sync` and tracked watches wait for
    pub commitment: CommitmentConfig,
    /// Commitment used when fetching blockhashes
    pub blockhash_commitment: CommitmentConfig,
    /// Deadline for a single confirmation wait
    pub confirm_timeout: Duration,
    /// Rebuild attempts after an expired-blockhash rejection
    pub max_rebuilds: usize,
    /// Base delay before the first rebuild; doubles per attempt
    pub rebuild_backoff: Duration,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::finalized(),
            blockhash_commitment: CommitmentConfig::finalized(),
            confirm_timeout: Duration::from_secs(60),
            max_rebuilds: 3,
            rebuild_backoff: Duration::from_millis(200),
        }
    }
}

pub struct SubmissionEngine {
    rpc: Arc<dyn LedgerRpc>,
    feed: Arc<dyn SignatureFeed>,
    tracker: ConfirmationTracker,
    settings: SubmitSettings,
}

impl std::fmt::Debug for SubmissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionEngine")
            .field("settings", &self.settings)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl SubmissionEngine {
    pub fn new(rpc: Arc<dyn LedgerRpc>, feed: Arc<dyn SignatureFeed>, settings: SubmitSettings) -> Self {
        let tracker = ConfirmationTracker::new(
            Arc::clone(&feed),
            settings.commitment,
            settings.confirm_timeout,
        );
        Self {
            rpc,
            feed,
            tracker,
            settings,
        }
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    pub fn tracker(&self) -> &ConfirmationTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &SubmitSettings {
        &self.settings
    }

    /// Fresh blockhash at the configured blockhash commitment
    pub async fn latest_blockhash(&self) -> Result<Hash, SubmitError> {
        Ok(self.rpc.latest_blockhash(self.settings.blockhash_commitment).await?)
    }

    /// Fetch a blockhash, then build and sign
    pub async fn build_and_sign(
        &self,
        label: &str,
        instructions: Vec<Instruction>,
        payer: &Pubkey,
        resolver: &SignerResolver,
    ) -> Result<SignedUnit, SubmitError> {
        let blockhash = self.latest_blockhash().await?;
        let unit = TxDraft::build(label, instructions, *payer, blockhash)?.sign(resolver)?;
        Ok(unit)
    }

    async fn send(&self, unit: &SignedUnit) -> Result<Signature, SubmitError> {
        match self.rpc.send_transaction(unit.transaction()).await {
            Ok(signature) => {
                metrics().units_submitted.inc();
                info!(label = %unit.label(), signature = %signature, "Transaction sent");
                Ok(signature)
            }
            // Same signature means the same unit; wait on the copy already in flight
            Err(RpcManagerError::AlreadyProcessed { .. }) => {
                let signature = unit.handle();
                info!(label = %unit.label(), signature = %signature, "Transaction already processed");
                Ok(signature)
            }
            Err(source) => {
                metrics()
                    .units_rejected
                    .with_label_values(&[source.category()])
                    .inc();
                warn!(label = %unit.label(), error = %source, "Transaction rejected");
                Err(SubmitError::Rejected {
                    label: unit.label().to_string(),
                    source,
                })
            }
        }
    }

    /// Send `unit` and wait until it reaches `commitment`
    ///
    /// # Errors
    ///
    /// - `Rejected` when the node refuses the unit
    /// - `ExecutionFailed` when it lands with an error
    /// - `TimedOut` when no notification arrives within `confirm_timeout`;
    ///   the unit may still land afterwards
    #[instrument(skip_all, fields(label = %unit.label()))]
    pub async fn submit_and_await(
        &self,
        unit: SignedUnit,
        commitment: CommitmentConfig,
    ) -> Result<Signature, SubmitError> {
        let signature = self.send(&unit).await?;
        let timer = Timer::new();
        let waited = self
            .feed
            .next_notification(&signature, commitment, self.settings.confirm_timeout)
            .await;
        timer.observe_duration(&metrics().confirmation_latency);

        let (result, outcome) = match waited {
            Ok(SignatureNotification::Reached { slot }) => {
                info!(label = %unit.label(), signature = %signature, slot, "Transaction committed");
                (ConfirmationResult::Finalized, Ok(signature))
            }
            Ok(SignatureNotification::ExecutionFailed { reason, .. }) => (
                ConfirmationResult::Failed(reason.clone()),
                Err(SubmitError::ExecutionFailed { signature, reason }),
            ),
            Err(e) => (ConfirmationResult::Failed(e.to_string()), Err(SubmitError::Rpc(e))),
            Ok(SignatureNotification::DeadlineElapsed) => (
                ConfirmationResult::TimedOut,
                Err(SubmitError::TimedOut {
                    signature,
                    waited_ms: self.settings.confirm_timeout.as_millis() as u64,
                }),
            ),
        };
        record_result(&result);
        outcome
    }

    /// Send `unit` and register it with the tracker; returns on node acceptance
    pub async fn submit_and_track(&self, unit: SignedUnit) -> Result<Signature, SubmitError> {
        let signature = self.send(&unit).await?;
        self.tracker.track(unit.label(), signature);
        Ok(signature)
    }

    /// Wait for every tracked unit; see [`ConfirmationTracker::barrier`]
    pub async fn barrier(&self) -> Result<usize, SubmitError> {
        self.tracker.barrier().await
    }

    /// Fresh blockhash, build, sign, `submit_and_await` at the engine commitment
    pub async fn execute_sync(
        &self,
        label: &str,
        instructions: Vec<Instruction>,
        payer: &Pubkey,
        resolver: &SignerResolver,
    ) -> Result<Signature, SubmitError> {
        self.execute_sync_with_commitment(label, instructions, payer, resolver, self.settings.commitment)
            .await
    }

    pub async fn execute_sync_with_commitment(
        &self,
        label: &str,
        instructions: Vec<Instruction>,
        payer: &Pubkey,
        resolver: &SignerResolver,
        commitment: CommitmentConfig,
    ) -> Result<Signature, SubmitError> {
        self.with_rebuild(label, || {
            let instructions = instructions.clone();
            async move {
                let unit = self.build_and_sign(label, instructions, payer, resolver).await?;
                self.submit_and_await(unit, commitment).await
            }
        })
        .await
    }

    /// Fresh blockhash, build, sign, `submit_and_track`
    pub async fn execute_async(
        &self,
        label: &str,
        instructions: Vec<Instruction>,
        payer: &Pubkey,
        resolver: &SignerResolver,
    ) -> Result<Signature, SubmitError> {
        self.with_rebuild(label, || {
            let instructions = instructions.clone();
            async move {
                let unit = self.build_and_sign(label, instructions, payer, resolver).await?;
                self.submit_and_track(unit).await
            }
        })
        .await
    }

    async fn with_rebuild<T, F, Fut>(&self, label: &str, attempt: F) -> Result<T, SubmitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SubmitError>>,
    {
        let base_ms = self.settings.rebuild_backoff.as_millis().max(1) as u64;
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(base_ms / 2)
            .max_delay(Duration::from_secs(5))
            .take(self.settings.max_rebuilds);

        RetryIf::spawn(strategy, attempt, |err: &SubmitError| {
            let rebuild = err.is_expired_blockhash();
            if rebuild {
                metrics().units_rebuilt.inc();
                warn!(label = %label, error = %err, "Blockhash expired, rebuilding");
            }
            rebuild
        })
        .await
    }
}
