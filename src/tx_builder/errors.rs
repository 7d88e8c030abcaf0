//! Error types for the transaction builder
//!
//! Build-time and sign-time failures are caller bugs: a malformed instruction
//! list or a signer set that cannot cover every required signature. Neither is
//! retried; both fail fast before anything reaches the network.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Which stage of unit construction rejected the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// `TxDraft::build` validation
    Build,
    /// `TxDraft::sign` signer resolution or signing
    Sign,
}

/// Error type for building and signing units
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// The draft carried no instructions
    #[error("Build error ({label}): instruction list is empty")]
    EmptyInstructions {
        /// Label of the unit being built
        label: String,
    },

    /// The fee payer was left as the default (all-zero) identity
    #[error("Build error ({label}): fee payer is not set")]
    FeePayerUnset {
        /// Label of the unit being built
        label: String,
    },

    /// A required signer has no matching credential in the resolver
    #[error("Sign error ({label}): no signer available for {pubkey}")]
    MissingSigner {
        /// Label of the unit being signed
        label: String,
        /// The identity that could not be resolved
        pubkey: Pubkey,
    },

    /// The signing primitive itself failed
    #[error("Sign error ({label}): {reason}")]
    Signing {
        /// Label of the unit being signed
        label: String,
        /// Detailed reason from the signer
        reason: String,
    },

    /// Wire serialization of a signed unit failed
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl TransactionBuilderError {
    /// Stage that produced this error
    pub fn stage(&self) -> BuildStage {
        match self {
            Self::EmptyInstructions { .. }
            | Self::FeePayerUnset { .. }
            | Self::Encoding(_) => BuildStage::Build,
            Self::MissingSigner { .. } | Self::Signing { .. } => BuildStage::Sign,
        }
    }

    /// Builder errors never succeed on retry with the same input
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self.stage() {
            BuildStage::Build => "build",
            BuildStage::Sign => "sign",
        }
    }

    /// The unresolved identity, if this is a missing-signer error
    pub fn missing_signer(&self) -> Option<&Pubkey> {
        match self {
            Self::MissingSigner { pubkey, .. } => Some(pubkey),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransactionBuilderError::EmptyInstructions {
            label: "Begin OffChain config".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Build error (Begin OffChain config): instruction list is empty"
        );

        let key = Pubkey::new_unique();
        let err = TransactionBuilderError::MissingSigner {
            label: "Set billing".to_string(),
            pubkey: key,
        };
        assert_eq!(
            err.to_string(),
            format!("Sign error (Set billing): no signer available for {}", key)
        );
    }

    #[test]
    fn test_error_stages_and_categories() {
        let build = TransactionBuilderError::FeePayerUnset {
            label: "x".to_string(),
        };
        assert_eq!(build.stage(), BuildStage::Build);
        assert_eq!(build.category(), "build");

        let sign = TransactionBuilderError::MissingSigner {
            label: "x".to_string(),
            pubkey: Pubkey::new_unique(),
        };
        assert_eq!(sign.stage(), BuildStage::Sign);
        assert_eq!(sign.category(), "sign");
        assert!(sign.missing_signer().is_some());
        assert!(!sign.is_retryable());
    }
}
