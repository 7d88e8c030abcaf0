//! Submission and confirmation tracking
//!
//! - **engine**: `SubmissionEngine`, synchronous and tracked submission plus
//!   the build-sign-send composites
//! - **tracker**: `ConfirmationTracker`, concurrent watches and the barrier
//! - **errors**: `SubmitError`

pub mod errors;
mod engine;
mod tracker;

pub use engine::{SubmissionEngine, SubmitSettings};
pub use errors::SubmitError;
pub use tracker::{ConfirmationResult, ConfirmationTracker, WatchOutcome};
