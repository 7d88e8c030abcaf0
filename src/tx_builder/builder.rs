//! Draft construction and signing
//!
//! A `TxDraft` holds an ordered instruction list, the fee payer and the
//! freshness token (recent blockhash). `TxDraft::sign` turns it into a
//! `SignedUnit` only when every required signer resolves; there is no partial
//! signing path.

use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{describe_instructions, required_signers, validate_instructions};
use crate::tx_builder::output::SignedUnit;
use crate::tx_builder::signer::SignerResolver;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::Keypair,
    transaction::Transaction,
};
use tracing::debug;

/// Validated, unsigned unit
#[derive(Debug, Clone)]
pub struct TxDraft {
    label: String,
    instructions: Vec<Instruction>,
    fee_payer: Pubkey,
    recent_blockhash: Hash,
}

impl TxDraft {
    /// Validate and assemble a draft
    ///
    /// # Errors
    ///
    /// Returns a build-stage `TransactionBuilderError` when the instruction
    /// list is empty or the fee payer is unset.
    pub fn build(
        label: impl Into<String>,
        instructions: Vec<Instruction>,
        fee_payer: Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, TransactionBuilderError> {
        let label = label.into();
        validate_instructions(&label, &instructions, &fee_payer)?;
        Ok(Self {
            label,
            instructions,
            fee_payer,
            recent_blockhash,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.recent_blockhash
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Identities that must sign this draft, fee payer first
    pub fn required_signers(&self) -> Vec<Pubkey> {
        required_signers(&self.fee_payer, &self.instructions)
    }

    /// Resolve every required signer and sign
    ///
    /// # Errors
    ///
    /// - `MissingSigner` naming the first identity the resolver cannot cover
    /// - `Signing` if the signature primitive rejects the key set
    pub fn sign(self, resolver: &SignerResolver) -> Result<SignedUnit, TransactionBuilderError> {
        let required = self.required_signers();

        let mut keypairs: Vec<&Keypair> = Vec::with_capacity(required.len());
        for pubkey in &required {
            let keypair = resolver
                .resolve(pubkey)
                .ok_or_else(|| TransactionBuilderError::MissingSigner {
                    label: self.label.clone(),
                    pubkey: *pubkey,
                })?;
            keypairs.push(keypair);
        }

        debug!(
            label = %self.label,
            signers = required.len(),
            "Signing unit\n{}",
            describe_instructions(&self.label, &self.fee_payer, &self.instructions)
        );

        let message = Message::new_with_blockhash(
            &self.instructions,
            Some(&self.fee_payer),
            &self.recent_blockhash,
        );
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(&keypairs, self.recent_blockhash)
            .map_err(|e| TransactionBuilderError::Signing {
                label: self.label.clone(),
                reason: e.to_string(),
            })?;

        Ok(SignedUnit::new(self.label, transaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        instruction::AccountMeta,
        signature::Signer,
        system_instruction,
    };
    use std::sync::Arc;

    fn owner_ix(owner: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 9],
            vec![
                AccountMeta::new(Pubkey::new_unique(), false),
                AccountMeta::new_readonly(*owner, true),
            ],
        )
    }

    #[test]
    fn test_build_rejects_empty() {
        let err = TxDraft::build("x", vec![], Pubkey::new_unique(), Hash::new_unique())
            .unwrap_err();
        assert!(matches!(err, TransactionBuilderError::EmptyInstructions { .. }));
    }

    #[test]
    fn test_sign_covers_payer_and_owner() {
        let payer = Arc::new(Keypair::new());
        let owner = Arc::new(Keypair::new());
        let resolver = SignerResolver::new([payer.clone(), owner.clone()]);

        let draft = TxDraft::build(
            "Set billing",
            vec![owner_ix(&owner.pubkey())],
            payer.pubkey(),
            Hash::new_unique(),
        )
        .unwrap();
        let unit = draft.sign(&resolver).unwrap();

        assert_eq!(unit.signer_signatures().len(), 2);
        assert!(unit.signature_for(&payer.pubkey()).is_some());
        assert!(unit.signature_for(&owner.pubkey()).is_some());
        assert_eq!(unit.handle(), unit.signature_for(&payer.pubkey()).unwrap());
        assert!(unit.transaction().verify().is_ok());
    }

    #[test]
    fn test_sign_names_missing_signer() {
        let payer = Arc::new(Keypair::new());
        let owner = Keypair::new();
        let resolver = SignerResolver::new([payer.clone()]);

        let draft = TxDraft::build(
            "Commit OffChain config",
            vec![owner_ix(&owner.pubkey())],
            payer.pubkey(),
            Hash::new_unique(),
        )
        .unwrap();

        let err = draft.sign(&resolver).unwrap_err();
        assert_eq!(err.missing_signer(), Some(&owner.pubkey()));
    }

    #[test]
    fn test_sign_missing_fee_payer_credential() {
        let payer = Keypair::new();
        let recipient = Pubkey::new_unique();
        let resolver = SignerResolver::new([Arc::new(Keypair::new())]);

        let draft = TxDraft::build(
            "transfer",
            vec![system_instruction::transfer(&payer.pubkey(), &recipient, 1)],
            payer.pubkey(),
            Hash::new_unique(),
        )
        .unwrap();

        let err = draft.sign(&resolver).unwrap_err();
        assert_eq!(err.missing_signer(), Some(&payer.pubkey()));
    }

    #[test]
    fn test_extra_candidates_are_ignored() {
        let payer = Arc::new(Keypair::new());
        let unrelated = Arc::new(Keypair::new());
        let resolver = SignerResolver::new([payer.clone(), unrelated]);

        let draft = TxDraft::build(
            "transfer",
            vec![system_instruction::transfer(
                &payer.pubkey(),
                &Pubkey::new_unique(),
                1,
            )],
            payer.pubkey(),
            Hash::new_unique(),
        )
        .unwrap();

        let unit = draft.sign(&resolver).unwrap();
        assert_eq!(unit.signer_signatures().len(), 1);
    }
}
