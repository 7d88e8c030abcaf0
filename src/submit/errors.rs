//! Submission error taxonomy
//!
//! `Rejected` is the only variant that rebuilding can fix, and only when the
//! node reported an aged-out blockhash. `TimedOut` is ambiguous: the unit may
//! still land, so callers re-read state before retrying.

use crate::rpc_manager::RpcManagerError;
use crate::tx_builder::TransactionBuilderError;
use solana_sdk::signature::Signature;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// Build or sign failure, never reached the network
    #[error(transparent)]
    Build(#[from] TransactionBuilderError),

    /// The node refused the unit outright; nothing is tracked
    #[error("Unit '{label}' rejected: {source}")]
    Rejected {
        label: String,
        #[source]
        source: RpcManagerError,
    },

    /// The unit landed but its on-chain execution failed
    #[error("Execution failed for {signature}: {reason}")]
    ExecutionFailed { signature: Signature, reason: String },

    /// No confirmation within the deadline; the outcome is unknown
    #[error("Confirmation for {signature} not observed within {waited_ms}ms")]
    TimedOut { signature: Signature, waited_ms: u64 },

    /// Network failure outside the submit call (blockhash fetch, subscription)
    #[error(transparent)]
    Rpc(#[from] RpcManagerError),
}

impl SubmitError {
    /// Whether the same operation may succeed if issued again
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::Build(e) => e.is_retryable(),
            SubmitError::Rejected { source, .. } => source.is_retryable(),
            SubmitError::ExecutionFailed { .. } => false,
            SubmitError::TimedOut { .. } => false,
            SubmitError::Rpc(e) => e.is_retryable(),
        }
    }

    /// Rejection caused by an expired freshness token
    pub fn is_expired_blockhash(&self) -> bool {
        matches!(self, SubmitError::Rejected { source, .. } if source.is_expired_blockhash())
    }

    /// Signature the error refers to, when the unit reached the network
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SubmitError::ExecutionFailed { signature, .. }
            | SubmitError::TimedOut { signature, .. } => Some(signature),
            _ => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            SubmitError::Build(e) => e.category(),
            SubmitError::Rejected { .. } => "rejected",
            SubmitError::ExecutionFailed { .. } => "execution_failed",
            SubmitError::TimedOut { .. } => "timed_out",
            SubmitError::Rpc(e) => e.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_rejection_is_retryable() {
        let err = SubmitError::Rejected {
            label: "Write chunk".to_string(),
            source: RpcManagerError::BlockhashNotFound {
                endpoint: "mock".to_string(),
            },
        };
        assert!(err.is_expired_blockhash());
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rejected");
        assert!(err.to_string().contains("Write chunk"));
    }

    #[test]
    fn test_landed_failures_are_not_retryable() {
        let signature = Signature::default();
        let failed = SubmitError::ExecutionFailed {
            signature,
            reason: "custom program error: 0x1".to_string(),
        };
        let timed_out = SubmitError::TimedOut {
            signature,
            waited_ms: 500,
        };

        for err in [&failed, &timed_out] {
            assert!(!err.is_retryable());
            assert!(!err.is_expired_blockhash());
            assert_eq!(err.signature(), Some(&signature));
        }
        assert_eq!(timed_out.category(), "timed_out");
    }

    #[test]
    fn test_insufficient_funds_rejection_is_final() {
        let err = SubmitError::Rejected {
            label: "Set billing".to_string(),
            source: RpcManagerError::InsufficientFunds {
                endpoint: "mock".to_string(),
            },
        };
        assert!(!err.is_retryable());
        assert!(!err.is_expired_blockhash());
    }

    #[test]
    fn test_builder_error_converts() {
        let err: SubmitError = TransactionBuilderError::EmptyInstructions {
            label: "x".to_string(),
        }
        .into();
        assert_eq!(err.category(), "build");
        assert!(err.signature().is_none());
    }
}
