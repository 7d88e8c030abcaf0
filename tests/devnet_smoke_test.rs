use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use solclient::rpc_manager::{LedgerRpc, RpcManagerError, SolanaNetwork};
use std::time::Duration;

const DEVNET_RPC: &str = "https://api.devnet.solana.com";
const DEVNET_WS: &str = "wss://api.devnet.solana.com";

#[tokio::test]
#[ignore] // Requires network access
async fn test_devnet_blockhash_and_rent() {
    let network = SolanaNetwork::connect(
        DEVNET_RPC,
        DEVNET_WS,
        Duration::from_secs(30),
        CommitmentConfig::finalized(),
    )
    .await
    .expect("Failed to connect");

    let blockhash = network
        .latest_blockhash(CommitmentConfig::finalized())
        .await
        .expect("Failed to fetch blockhash");
    assert_ne!(blockhash, Default::default());

    let rent = network.minimum_balance_for_rent_exemption(0).await.unwrap();
    assert!(rent > 0);
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_devnet_missing_account() {
    let network = SolanaNetwork::connect(
        DEVNET_RPC,
        DEVNET_WS,
        Duration::from_secs(30),
        CommitmentConfig::confirmed(),
    )
    .await
    .expect("Failed to connect");

    let err = network.account_data(&Pubkey::new_unique()).await.unwrap_err();
    assert!(matches!(err, RpcManagerError::AccountNotFound { .. }));
}
