use crate::config_push::protocol::PushPhase;
use crate::submit::SubmitError;
use thiserror::Error;

/// Protocol step that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStep {
    Begin,
    Write { index: usize },
    Commit,
}

impl std::fmt::Display for PushStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushStep::Begin => write!(f, "begin"),
            PushStep::Write { index } => write!(f, "write[{index}]"),
            PushStep::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigPushError {
    #[error("Configuration payload is empty")]
    EmptyPayload,

    #[error("Invalid chunk size: {chunk_size}")]
    InvalidChunkSize { chunk_size: usize },

    /// A step was called from a phase that does not allow it
    #[error("Cannot {step} while push is {phase:?}")]
    OutOfOrder { step: PushStep, phase: PushPhase },

    /// A submitted step failed; the push is aborted
    #[error("Config push failed at {step}: {source}")]
    Phase {
        step: PushStep,
        #[source]
        source: SubmitError,
    },
}

impl ConfigPushError {
    /// A failed push is restarted from `begin`, which resets the staging
    /// buffer; only transient submit failures make that worthwhile
    pub fn is_retryable(&self) -> bool {
        match self {
            ConfigPushError::Phase { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ConfigPushError::EmptyPayload | ConfigPushError::InvalidChunkSize { .. } => "input",
            ConfigPushError::OutOfOrder { .. } => "out_of_order",
            ConfigPushError::Phase { source, .. } => source.category(),
        }
    }

    pub fn step(&self) -> Option<PushStep> {
        match self {
            ConfigPushError::OutOfOrder { step, .. } | ConfigPushError::Phase { step, .. } => Some(*step),
            _ => None,
        }
    }
}
