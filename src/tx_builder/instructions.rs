//! Instruction validation and signer derivation
//!
//! Stateless helpers used by the draft builder:
//! - validation of an instruction list before it is turned into a message
//! - derivation of the required-signer set (fee payer first, then every
//!   signer-flagged account in instruction order, deduplicated)
//! - a readable, multi-line description of a unit for debug logging

use crate::tx_builder::errors::TransactionBuilderError;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::fmt::Write as _;

/// Validate an instruction list for a unit labelled `label`
///
/// # Errors
///
/// - `EmptyInstructions` when `instructions` is empty
/// - `FeePayerUnset` when `fee_payer` is the default identity
///
/// The all-zero program id is the system program, so instruction targets are
/// not checked here.
pub fn validate_instructions(
    label: &str,
    instructions: &[Instruction],
    fee_payer: &Pubkey,
) -> Result<(), TransactionBuilderError> {
    if instructions.is_empty() {
        return Err(TransactionBuilderError::EmptyInstructions {
            label: label.to_string(),
        });
    }

    if *fee_payer == Pubkey::default() {
        return Err(TransactionBuilderError::FeePayerUnset {
            label: label.to_string(),
        });
    }

    Ok(())
}

/// Every identity that must sign a unit built from `instructions`
///
/// The fee payer always comes first, matching the ordering the compiled
/// message uses for its signature slots.
pub fn required_signers(fee_payer: &Pubkey, instructions: &[Instruction]) -> Vec<Pubkey> {
    let mut signers = vec![*fee_payer];
    for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
        if meta.is_signer && !signers.contains(&meta.pubkey) {
            signers.push(meta.pubkey);
        }
    }
    signers
}

/// Render a unit as an indented tree for debug logs
pub fn describe_instructions(label: &str, fee_payer: &Pubkey, instructions: &[Instruction]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{label}");
    let _ = writeln!(out, "├─ fee payer: {fee_payer}");
    for (i, ix) in instructions.iter().enumerate() {
        let _ = writeln!(
            out,
            "├─ instruction[{i}] program={} data_len={}",
            ix.program_id,
            ix.data.len()
        );
        for meta in &ix.accounts {
            let _ = writeln!(
                out,
                "│  ├─ {} [{}{}]",
                meta.pubkey,
                if meta.is_writable { "W" } else { "R" },
                if meta.is_signer { "S" } else { "" }
            );
        }
    }
    out
}
