use super::fixtures::Harness;
use crate::funding::{airdrop_all, create_account_instruction, FundingError};
use crate::test_utils::NetworkEvent;
use crate::tx_builder::TxDraft;
use solana_sdk::{
    hash::Hash,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_program,
};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn test_airdrop_all_waits_for_every_wallet() {
    let h = Harness::new();
    let wallets: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();

    let confirmed = airdrop_all(&h.engine, &wallets, 5).await.unwrap();
    assert_eq!(confirmed, 3);

    let events = h.network.events();
    let airdropped: Vec<(Pubkey, u64)> = events
        .iter()
        .filter_map(|e| match e {
            NetworkEvent::Airdrop { pubkey, lamports, .. } => Some((*pubkey, *lamports)),
            _ => None,
        })
        .collect();
    assert_eq!(
        airdropped,
        wallets.iter().map(|p| (*p, 5 * LAMPORTS_PER_SOL)).collect::<Vec<_>>()
    );
    let confirmations = events
        .iter()
        .filter(|e| matches!(e, NetworkEvent::Confirmed { .. }))
        .count();
    assert_eq!(confirmations, 3);
    assert_eq!(h.engine.tracker().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_airdrop_request_stops_the_loop() {
    let h = Harness::new();
    let wallets: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
    h.network.fail_airdrop_for(wallets[1]);

    let err = airdrop_all(&h.engine, &wallets, 1).await.unwrap_err();
    match &err {
        FundingError::Airdrop { pubkey, .. } => assert_eq!(*pubkey, wallets[1]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.category(), "airdrop");

    let requested = h
        .network
        .events()
        .iter()
        .filter(|e| matches!(e, NetworkEvent::Airdrop { .. }))
        .count();
    assert_eq!(requested, 1);

    // The first request is still tracked for the next barrier
    assert_eq!(h.engine.tracker().outstanding(), 1);
    assert_eq!(h.engine.barrier().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_airdrop_amount_overflow_is_rejected() {
    let h = Harness::new();
    let err = airdrop_all(&h.engine, &[Pubkey::new_unique()], u64::MAX)
        .await
        .unwrap_err();
    assert_eq!(err, FundingError::Overflow { sol: u64::MAX });
    assert!(h.network.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_account_instruction_funds_rent_minimum() {
    let h = Harness::new();
    let new_account = Arc::new(Keypair::new());
    let owner = Pubkey::new_unique();

    let ix = create_account_instruction(
        h.engine.rpc().as_ref(),
        &h.payer.pubkey(),
        &new_account.pubkey(),
        512,
        &owner,
    )
    .await
    .unwrap();

    assert_eq!(ix.program_id, system_program::id());
    let lamports = u64::from_le_bytes(ix.data[4..12].try_into().unwrap());
    assert_eq!(lamports, (512 + 128) * 6960);
    let space = u64::from_le_bytes(ix.data[12..20].try_into().unwrap());
    assert_eq!(space, 512);

    // Payer and the new account both have to sign
    let draft = TxDraft::build("Create account", vec![ix], h.payer.pubkey(), Hash::new_unique()).unwrap();
    let signers = draft.required_signers();
    assert_eq!(signers, vec![h.payer.pubkey(), new_account.pubkey()]);

    let err = draft.clone().sign(&h.resolver).unwrap_err();
    assert_eq!(err.missing_signer(), Some(&new_account.pubkey()));

    let unit = draft
        .sign(&h.resolver.with_signers([Arc::clone(&new_account)]))
        .unwrap();
    assert!(unit.transaction().verify().is_ok());
    assert!(unit.signature_for(&new_account.pubkey()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_account_unit_lands_on_the_ledger() {
    let h = Harness::new();
    let new_account = Arc::new(Keypair::new());
    let ix = create_account_instruction(
        h.engine.rpc().as_ref(),
        &h.payer.pubkey(),
        &new_account.pubkey(),
        64,
        &h.program.program_id,
    )
    .await
    .unwrap();

    let signature = h
        .engine
        .execute_sync(
            "Create account",
            vec![ix],
            &h.payer.pubkey(),
            &h.resolver.with_signers([new_account]),
        )
        .await
        .unwrap();
    assert!(h
        .network
        .events()
        .iter()
        .any(|e| matches!(e, NetworkEvent::Confirmed { signature: s, .. } if *s == signature)));
}
