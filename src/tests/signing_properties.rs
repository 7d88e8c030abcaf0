use crate::tx_builder::{SignerResolver, TransactionBuilderError, TxDraft};
use proptest::prelude::*;
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

/// Instructions requiring `signers`, plus the fee payer, spread over `ix_count`
fn instructions_for(signers: &[Arc<Keypair>], ix_count: usize) -> Vec<Instruction> {
    (0..ix_count)
        .map(|i| {
            let mut accounts = vec![AccountMeta::new(Pubkey::new_unique(), false)];
            accounts.extend(
                signers
                    .iter()
                    .skip(i)
                    .step_by(ix_count)
                    .map(|kp| AccountMeta::new_readonly(kp.pubkey(), true)),
            );
            Instruction::new_with_bytes(Pubkey::new_unique(), &[i as u8], accounts)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sign_succeeds_iff_every_required_signer_resolves(
        available in prop::collection::vec(any::<bool>(), 0..5),
        payer_available in any::<bool>(),
        ix_count in 1usize..4,
    ) {
        let payer = Arc::new(Keypair::new());
        let signers: Vec<Arc<Keypair>> = available.iter().map(|_| Arc::new(Keypair::new())).collect();

        let mut known: Vec<Arc<Keypair>> = signers
            .iter()
            .zip(&available)
            .filter(|(_, ok)| **ok)
            .map(|(kp, _)| Arc::clone(kp))
            .collect();
        if payer_available {
            known.push(Arc::clone(&payer));
        }
        // Unrelated keys never satisfy a requirement
        known.push(Arc::new(Keypair::new()));
        let resolver = SignerResolver::new(known);

        let draft = TxDraft::build(
            "property",
            instructions_for(&signers, ix_count),
            payer.pubkey(),
            Hash::new_unique(),
        )
        .unwrap();
        let required = draft.required_signers();
        prop_assert_eq!(required.first(), Some(&payer.pubkey()));
        prop_assert_eq!(required.len(), signers.len() + 1);

        let expect_ok = payer_available && available.iter().all(|ok| *ok);
        match draft.sign(&resolver) {
            Ok(unit) => {
                prop_assert!(expect_ok);
                prop_assert!(unit.transaction().verify().is_ok());
                prop_assert_eq!(unit.signer_signatures().len(), required.len());
            }
            Err(TransactionBuilderError::MissingSigner { pubkey, .. }) => {
                prop_assert!(!expect_ok);
                prop_assert!(!resolver.contains(&pubkey));
                prop_assert!(required.contains(&pubkey));
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
