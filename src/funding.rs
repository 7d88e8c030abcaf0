//! Account funding helpers
//!
//! Airdrops are tracked at `processed` commitment through the engine's
//! confirmation tracker. Account creation only computes the rent-exempt
//! minimum; the payer funds the account in the same transaction.

use crate::rpc_manager::{LedgerRpc, RpcManagerError};
use crate::submit::{SubmissionEngine, SubmitError};
use solana_sdk::{
    commitment_config::CommitmentConfig, instruction::Instruction, native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey, system_instruction,
};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FundingError {
    #[error("Airdrop request for {pubkey} failed: {source}")]
    Airdrop {
        pubkey: Pubkey,
        #[source]
        source: RpcManagerError,
    },

    #[error("Airdrop confirmation failed: {0}")]
    Confirmation(#[source] SubmitError),

    #[error("Rent exemption query failed: {0}")]
    Rent(#[source] RpcManagerError),

    #[error("Airdrop amount overflows: {sol} SOL")]
    Overflow { sol: u64 },
}

impl FundingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FundingError::Airdrop { source, .. } | FundingError::Rent(source) => source.is_retryable(),
            FundingError::Confirmation(e) => e.is_retryable(),
            FundingError::Overflow { .. } => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            FundingError::Airdrop { .. } => "airdrop",
            FundingError::Confirmation(_) => "confirmation",
            FundingError::Rent(_) => "rent",
            FundingError::Overflow { .. } => "overflow",
        }
    }
}

/// Airdrop `sol` to every wallet, then wait for all of them
///
/// Stops at the first failed request; airdrops already requested stay with
/// the tracker and are collected by the next barrier.
pub async fn airdrop_all(engine: &SubmissionEngine, wallets: &[Pubkey], sol: u64) -> Result<usize, FundingError> {
    let lamports = sol
        .checked_mul(LAMPORTS_PER_SOL)
        .ok_or(FundingError::Overflow { sol })?;

    for pubkey in wallets {
        let signature = engine
            .rpc()
            .request_airdrop(pubkey, lamports)
            .await
            .map_err(|source| FundingError::Airdrop {
                pubkey: *pubkey,
                source,
            })?;
        info!(pubkey = %pubkey, signature = %signature, lamports, "Airdropping account");
        engine
            .tracker()
            .track_with_commitment("Airdrop", signature, CommitmentConfig::processed());
    }

    engine.barrier().await.map_err(FundingError::Confirmation)
}

/// System `create_account` funded with the rent-exempt minimum for `space`
///
/// `new_account` becomes a required signer of the unit carrying this
/// instruction.
pub async fn create_account_instruction(
    rpc: &dyn LedgerRpc,
    payer: &Pubkey,
    new_account: &Pubkey,
    space: u64,
    owner: &Pubkey,
) -> Result<Instruction, FundingError> {
    let rent = rpc
        .minimum_balance_for_rent_exemption(space as usize)
        .await
        .map_err(FundingError::Rent)?;
    Ok(system_instruction::create_account(payer, new_account, rent, space, owner))
}
