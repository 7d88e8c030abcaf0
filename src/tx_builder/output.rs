//! Signed unit ready for submission
//!
//! `SignedUnit` owns the signed legacy transaction together with the ordered
//! `(signer, signature)` pairs taken from the message header. The submission
//! engine consumes it; nothing keeps a unit after it has been sent.

use crate::tx_builder::errors::TransactionBuilderError;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

/// A fully signed transaction plus its label
#[derive(Debug, Clone)]
pub struct SignedUnit {
    label: String,
    transaction: Transaction,
    signer_signatures: Vec<(Pubkey, Signature)>,
}

impl SignedUnit {
    pub(crate) fn new(label: String, transaction: Transaction) -> Self {
        let required = usize::from(transaction.message.header.num_required_signatures);
        let signer_signatures = transaction
            .message
            .account_keys
            .iter()
            .take(required)
            .copied()
            .zip(transaction.signatures.iter().copied())
            .collect();

        Self {
            label,
            transaction,
            signer_signatures,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Handle the network will report confirmations under (fee payer signature)
    pub fn handle(&self) -> Signature {
        self.transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.account_keys.first()
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.transaction.message.recent_blockhash
    }

    /// Ordered signer → signature pairs, fee payer first
    pub fn signer_signatures(&self) -> &[(Pubkey, Signature)] {
        &self.signer_signatures
    }

    pub fn signature_for(&self, pubkey: &Pubkey) -> Option<Signature> {
        self.signer_signatures
            .iter()
            .find(|(key, _)| key == pubkey)
            .map(|(_, sig)| *sig)
    }

    /// Bincode wire encoding of the transaction
    pub fn to_wire(&self) -> Result<Vec<u8>, TransactionBuilderError> {
        bincode::serialize(&self.transaction)
            .map_err(|e| TransactionBuilderError::Encoding(e.to_string()))
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }
}

#[cfg(test)]
mod tests {
    use crate::tx_builder::{SignerResolver, TxDraft};
    use solana_sdk::{
        hash::Hash,
        pubkey::Pubkey,
        signature::{Keypair, Signer},
        system_instruction,
        transaction::Transaction,
    };
    use std::sync::Arc;

    #[test]
    fn test_wire_encoding_decodes_to_same_transaction() {
        let payer = Arc::new(Keypair::new());
        let blockhash = Hash::new_unique();
        let unit = TxDraft::build(
            "transfer",
            vec![system_instruction::transfer(
                &payer.pubkey(),
                &Pubkey::new_unique(),
                42,
            )],
            payer.pubkey(),
            blockhash,
        )
        .unwrap()
        .sign(&SignerResolver::new([payer.clone()]))
        .unwrap();

        let wire = unit.to_wire().unwrap();
        let decoded: Transaction = bincode::deserialize(&wire).unwrap();
        assert_eq!(&decoded, unit.transaction());
        assert_eq!(unit.recent_blockhash(), &blockhash);
        assert_eq!(unit.fee_payer(), Some(&payer.pubkey()));
    }
}
