//! solclient - Solana transaction orchestration library
//!
//! Builds and signs instruction batches, submits them synchronously or with
//! background confirmation tracking, and pushes oversized configuration
//! payloads through a staged begin / write / commit protocol.

pub mod config;
pub mod config_push;
pub mod funding;
pub mod metrics;
pub mod observability;
pub mod ocr2;
pub mod rpc_manager;
pub mod state_reader;
pub mod submit;
pub mod test_utils;
pub mod tx_builder;
pub mod wallet;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
