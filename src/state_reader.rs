//! On-chain state reads for diagnostics
//!
//! Every call goes to the network; nothing is cached.

use crate::rpc_manager::{LedgerRpc, RpcManagerError};
use serde::de::DeserializeOwned;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use thiserror::Error;

/// Length of the Anchor account discriminator
pub const ACCOUNT_DISCRIMINATOR_LEN: usize = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateReadError {
    #[error("Account not found: {0}")]
    NotFound(Pubkey),

    #[error("Failed to decode account {account} ({len} bytes): {reason}")]
    Decode {
        account: Pubkey,
        len: usize,
        reason: String,
    },

    #[error(transparent)]
    Rpc(RpcManagerError),
}

impl StateReadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StateReadError::Rpc(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            StateReadError::NotFound(_) => "not_found",
            StateReadError::Decode { .. } => "decode",
            StateReadError::Rpc(e) => e.category(),
        }
    }
}

/// How account bytes map onto the caller's type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountLayout {
    /// bincode over the whole account
    Raw,
    /// bincode after an 8-byte discriminator
    Discriminated,
}

#[derive(Clone)]
pub struct StateReader {
    rpc: Arc<dyn LedgerRpc>,
}

impl StateReader {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Current raw account data
    pub async fn read(&self, account: &Pubkey) -> Result<Vec<u8>, StateReadError> {
        self.rpc.account_data(account).await.map_err(|e| match e {
            RpcManagerError::AccountNotFound { .. } => StateReadError::NotFound(*account),
            other => StateReadError::Rpc(other),
        })
    }

    /// Read and decode into `T`
    pub async fn read_decoded<T: DeserializeOwned>(
        &self,
        account: &Pubkey,
        layout: AccountLayout,
    ) -> Result<T, StateReadError> {
        let data = self.read(account).await?;
        decode_account(account, &data, layout)
    }
}

/// Decode account bytes; trailing bytes (account padding) are ignored
pub fn decode_account<T: DeserializeOwned>(
    account: &Pubkey,
    data: &[u8],
    layout: AccountLayout,
) -> Result<T, StateReadError> {
    let decode_err = |reason: String| StateReadError::Decode {
        account: *account,
        len: data.len(),
        reason,
    };

    let body = match layout {
        AccountLayout::Raw => data,
        AccountLayout::Discriminated => data
            .get(ACCOUNT_DISCRIMINATOR_LEN..)
            .ok_or_else(|| decode_err("shorter than the account discriminator".to_string()))?,
    };
    bincode::deserialize(body).map_err(|e| decode_err(e.to_string()))
}
