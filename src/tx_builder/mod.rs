//! Transaction builder
//!
//! Turns an unordered set of candidate signers and an ordered instruction list
//! into a signed, transmittable unit.
//!
//! ## Architecture
//!
//! - **errors**: build-stage and sign-stage error taxonomy
//! - **signer**: exact-match identity → keypair resolution
//! - **instructions**: validation, required-signer derivation, debug rendering
//! - **builder**: `TxDraft` (validated, unsigned) and its `sign` step
//! - **output**: `SignedUnit`, the signed transaction handed to submission
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solclient::tx_builder::{SignerResolver, TxDraft};
//! # use solana_sdk::{hash::Hash, instruction::Instruction, signature::{Keypair, Signer}};
//! # use std::sync::Arc;
//! # fn example(ix: Instruction, blockhash: Hash) -> Result<(), Box<dyn std::error::Error>> {
//! let payer = Arc::new(Keypair::new());
//! let resolver = SignerResolver::new([payer.clone()]);
//!
//! let unit = TxDraft::build("Set billing", vec![ix], payer.pubkey(), blockhash)?
//!     .sign(&resolver)?;
//! let _wire = unit.to_wire()?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::{BuildStage, TransactionBuilderError};

mod builder;
pub mod instructions;
mod output;
mod signer;

pub use builder::TxDraft;
pub use output::SignedUnit;
pub use signer::SignerResolver;
