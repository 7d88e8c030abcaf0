//! Confirmation tracker
//!
//! One spawned watch per tracked signature. Each watch opens its own
//! subscription through the `SignatureFeed`, resolves on the first
//! notification at the watch's commitment (or on the deadline), and releases
//! the subscription. Finished watches leave their outcome in a shared book
//! that `barrier` empties once nothing is running.

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{SignatureFeed, SignatureNotification};
use crate::submit::errors::SubmitError;
use parking_lot::Mutex;
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Terminal state of one confirmation watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationResult {
    /// Reached the watch's commitment level and executed successfully
    Finalized,
    /// Landed with an execution error, or the subscription broke
    Failed(String),
    /// Deadline elapsed before any notification
    TimedOut,
}

impl ConfirmationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConfirmationResult::Finalized)
    }
}

/// What a finished watch reports back to the barrier
#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub label: String,
    pub signature: Signature,
    pub result: ConfirmationResult,
}

impl WatchOutcome {
    fn into_error(self, deadline: Duration) -> Option<SubmitError> {
        match self.result {
            ConfirmationResult::Finalized => None,
            ConfirmationResult::Failed(reason) => Some(SubmitError::ExecutionFailed {
                signature: self.signature,
                reason,
            }),
            ConfirmationResult::TimedOut => Some(SubmitError::TimedOut {
                signature: self.signature,
                waited_ms: deadline.as_millis() as u64,
            }),
        }
    }
}

/// Watches registered and not yet collected by a barrier
#[derive(Default)]
struct WatchBook {
    running: usize,
    /// Finished outcomes in completion order
    completed: Vec<WatchOutcome>,
}

#[derive(Default)]
struct SharedBook {
    book: Mutex<WatchBook>,
    changed: Notify,
}

/// Registration of one watch; reports exactly one outcome when dropped
///
/// A watch that is aborted or panics before reporting is recorded as failed.
/// Also keeps the outstanding-watch gauge in step.
struct WatchSlot {
    shared: Arc<SharedBook>,
    label: String,
    signature: Signature,
    result: Option<ConfirmationResult>,
}

impl WatchSlot {
    fn register(shared: Arc<SharedBook>, label: String, signature: Signature) -> Self {
        shared.book.lock().running += 1;
        metrics().outstanding_watches.inc();
        Self {
            shared,
            label,
            signature,
            result: None,
        }
    }

    fn complete(mut self, result: ConfirmationResult) {
        self.result = Some(result);
    }
}

impl Drop for WatchSlot {
    fn drop(&mut self) {
        let result = self
            .result
            .take()
            .unwrap_or_else(|| ConfirmationResult::Failed("confirmation watch aborted".to_string()));
        {
            let mut book = self.shared.book.lock();
            book.running = book.running.saturating_sub(1);
            book.completed.push(WatchOutcome {
                label: std::mem::take(&mut self.label),
                signature: self.signature,
                result,
            });
        }
        self.shared.changed.notify_waiters();
        metrics().outstanding_watches.dec();
    }
}

/// Concurrent group of outstanding confirmation watches
///
/// Outcomes are kept until a barrier collects them, so a barrier that is
/// dropped mid-wait loses nothing. Dropping the tracker aborts every
/// unresolved watch and with it the subscription it holds.
pub struct ConfirmationTracker {
    feed: Arc<dyn SignatureFeed>,
    commitment: CommitmentConfig,
    deadline: Duration,
    shared: Arc<SharedBook>,
    tasks: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for ConfirmationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationTracker")
            .field("commitment", &self.commitment)
            .field("deadline", &self.deadline)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl ConfirmationTracker {
    pub fn new(feed: Arc<dyn SignatureFeed>, commitment: CommitmentConfig, deadline: Duration) -> Self {
        Self {
            feed,
            commitment,
            deadline,
            shared: Arc::new(SharedBook::default()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Number of watches registered and not yet collected by a barrier
    pub fn outstanding(&self) -> usize {
        let book = self.shared.book.lock();
        book.running + book.completed.len()
    }

    /// Start watching `signature` at the tracker's default commitment
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&self, label: impl Into<String>, signature: Signature) {
        self.track_with_commitment(label, signature, self.commitment);
    }

    /// Start watching `signature` at an explicit commitment level
    pub fn track_with_commitment(
        &self,
        label: impl Into<String>,
        signature: Signature,
        commitment: CommitmentConfig,
    ) {
        let label = label.into();
        let feed = Arc::clone(&self.feed);
        let deadline = self.deadline;

        debug!(label = %label, signature = %signature, commitment = ?commitment.commitment, "Tracking signature");
        let slot = WatchSlot::register(Arc::clone(&self.shared), label, signature);

        let mut tasks = self.tasks.lock();
        // Reap finished tasks; their outcomes already sit in the book
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let result = watch(feed.as_ref(), &slot.signature, commitment, deadline).await;
            log_outcome(&slot.label, &slot.signature, &result);
            slot.complete(result);
        });
    }

    /// Wait until every watch registered before this call returns has resolved
    ///
    /// Returns the number of watches collected, or the first failure in
    /// completion order. Later failures are logged and dropped. Watches
    /// registered after `barrier` returns belong to the next barrier.
    /// Cancel safe: outcomes are only taken once nothing is running.
    pub async fn barrier(&self) -> Result<usize, SubmitError> {
        let collected = loop {
            let changed = self.shared.changed.notified();
            {
                let mut book = self.shared.book.lock();
                if book.running == 0 {
                    break std::mem::take(&mut book.completed);
                }
            }
            changed.await;
        };
        while self.tasks.lock().try_join_next().is_some() {}

        let resolved = collected.len();
        let mut failures = collected
            .into_iter()
            .filter_map(|outcome| outcome.into_error(self.deadline));
        let first_failure = failures.next();
        for err in failures {
            debug!(error = %err, "Additional failure collected by barrier");
        }

        match first_failure {
            Some(err) => {
                warn!(resolved, error = %err, "Barrier observed a failed watch");
                Err(err)
            }
            None => {
                debug!(resolved, "Barrier passed");
                Ok(resolved)
            }
        }
    }
}

async fn watch(
    feed: &dyn SignatureFeed,
    signature: &Signature,
    commitment: CommitmentConfig,
    deadline: Duration,
) -> ConfirmationResult {
    let timer = Timer::new();
    let result = match feed.next_notification(signature, commitment, deadline).await {
        Ok(SignatureNotification::Reached { .. }) => ConfirmationResult::Finalized,
        Ok(SignatureNotification::ExecutionFailed { reason, .. }) => ConfirmationResult::Failed(reason),
        Ok(SignatureNotification::DeadlineElapsed) => ConfirmationResult::TimedOut,
        Err(e) => ConfirmationResult::Failed(e.to_string()),
    };
    timer.observe_duration(&metrics().confirmation_latency);
    record_result(&result);
    result
}

pub(crate) fn record_result(result: &ConfirmationResult) {
    match result {
        ConfirmationResult::Finalized => metrics().units_finalized.inc(),
        ConfirmationResult::Failed(_) => metrics().units_failed.inc(),
        ConfirmationResult::TimedOut => metrics().units_timed_out.inc(),
    }
}

fn log_outcome(label: &str, signature: &Signature, result: &ConfirmationResult) {
    match result {
        ConfirmationResult::Finalized => {
            info!(label = %label, signature = %signature, "Transaction committed")
        }
        ConfirmationResult::Failed(reason) => {
            warn!(label = %label, signature = %signature, reason = %reason, "Transaction failed")
        }
        ConfirmationResult::TimedOut => {
            warn!(label = %label, signature = %signature, "Transaction confirmation timed out")
        }
    }
}
