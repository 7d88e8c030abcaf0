//! Wallet management module
//!
//! Keys come from base58 strings in the network config or from keypair files
//! (64 raw bytes or the JSON array the Solana CLI writes). Only public keys
//! are ever logged.

use crate::tx_builder::SignerResolver;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Failed to read keypair file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base58 private key: {0}")]
    Base58(String),

    #[error("Failed to parse keypair JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid keypair length: expected 64 bytes, got {0}")]
    Length(usize),

    #[error("Invalid keypair: all-zero key rejected")]
    AllZero,

    #[error("Invalid keypair bytes: {0}")]
    Keypair(String),

    #[error("Wallet index {index} out of range ({len} wallets)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No wallets configured")]
    Empty,
}

impl WalletError {
    /// Wallet errors are configuration mistakes
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Io { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            WalletError::Io { .. } => "io",
            WalletError::IndexOutOfRange { .. } | WalletError::Empty => "selection",
            _ => "key_material",
        }
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, WalletError> {
    if bytes.len() != 64 {
        return Err(WalletError::Length(bytes.len()));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Err(WalletError::AllZero);
    }
    Keypair::try_from(bytes).map_err(|e| WalletError::Keypair(e.to_string()))
}

/// Decode a base58 encoded 64-byte private key
pub fn keypair_from_base58(encoded: &str) -> Result<Keypair, WalletError> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| WalletError::Base58(e.to_string()))?;
    let keypair = keypair_from_bytes(&bytes)?;
    debug!(pubkey = %keypair.pubkey(), "Loaded wallet");
    Ok(keypair)
}

/// Read a keypair file: 64 raw bytes or a JSON byte array
pub fn keypair_from_file(path: impl AsRef<Path>) -> Result<Keypair, WalletError> {
    let path = path.as_ref();
    let keypair_bytes = std::fs::read(path).map_err(|source| WalletError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let keypair = if keypair_bytes.len() == 64 {
        keypair_from_bytes(&keypair_bytes)?
    } else {
        let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)?;
        keypair_from_bytes(&json)?
    };
    debug!(pubkey = %keypair.pubkey(), path = %path.display(), "Loaded wallet from file");
    Ok(keypair)
}

/// Funded wallets plus the index of the one that pays fees by default
#[derive(Clone)]
pub struct WalletSet {
    wallets: Vec<Arc<Keypair>>,
    default_index: usize,
}

impl std::fmt::Debug for WalletSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSet")
            .field("wallets", &self.pubkeys())
            .field("default_index", &self.default_index)
            .finish()
    }
}

impl WalletSet {
    pub fn new(wallets: Vec<Keypair>, default_index: usize) -> Result<Self, WalletError> {
        if wallets.is_empty() {
            return Err(WalletError::Empty);
        }
        let mut set = Self {
            wallets: wallets.into_iter().map(Arc::new).collect(),
            default_index: 0,
        };
        set.set_default(default_index)?;
        Ok(set)
    }

    /// Decode every base58 key, in order
    pub fn from_base58_keys<S: AsRef<str>>(keys: &[S], default_index: usize) -> Result<Self, WalletError> {
        let wallets = keys
            .iter()
            .map(|k| keypair_from_base58(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(wallets, default_index)
    }

    /// Append wallets read from keypair files
    pub fn extend_from_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), WalletError> {
        for path in paths {
            self.wallets.push(Arc::new(keypair_from_file(path)?));
        }
        Ok(())
    }

    /// Choose the default payer
    pub fn set_default(&mut self, index: usize) -> Result<(), WalletError> {
        if index >= self.wallets.len() {
            return Err(WalletError::IndexOutOfRange {
                index,
                len: self.wallets.len(),
            });
        }
        self.default_index = index;
        Ok(())
    }

    pub fn default_wallet(&self) -> &Arc<Keypair> {
        &self.wallets[self.default_index]
    }

    pub fn default_pubkey(&self) -> Pubkey {
        self.default_wallet().pubkey()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Keypair>> {
        self.wallets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Keypair>> {
        self.wallets.iter()
    }

    pub fn pubkeys(&self) -> Vec<Pubkey> {
        self.wallets.iter().map(|w| w.pubkey()).collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Resolver over the default payer plus `extra` signers
    pub fn resolver_with<I>(&self, extra: I) -> SignerResolver
    where
        I: IntoIterator<Item = Arc<Keypair>>,
    {
        SignerResolver::new(std::iter::once(Arc::clone(self.default_wallet())).chain(extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_base58_round_trip_and_rejections() {
        let kp = Keypair::new();
        let encoded = kp.to_base58_string();
        assert_eq!(keypair_from_base58(&encoded).unwrap().pubkey(), kp.pubkey());

        let zero = bs58::encode([0u8; 64]).into_string();
        assert!(matches!(keypair_from_base58(&zero), Err(WalletError::AllZero)));
        assert!(matches!(
            keypair_from_base58(&bs58::encode([1u8; 32]).into_string()),
            Err(WalletError::Length(32))
        ));
        assert!(matches!(keypair_from_base58("0OIl"), Err(WalletError::Base58(_))));
    }

    #[test]
    fn test_keypair_file_formats() {
        let kp = Keypair::new();

        let mut json = tempfile::NamedTempFile::new().unwrap();
        write!(json, "{}", serde_json::to_string(&kp.to_bytes().to_vec()).unwrap()).unwrap();
        assert_eq!(keypair_from_file(json.path()).unwrap().pubkey(), kp.pubkey());

        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&kp.to_bytes()).unwrap();
        assert_eq!(keypair_from_file(raw.path()).unwrap().pubkey(), kp.pubkey());

        let err = keypair_from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.category(), "io");
    }

    #[test]
    fn test_wallet_set_default_selection() {
        let a = Keypair::new();
        let b = Keypair::new();
        let b_pub = b.pubkey();
        let mut set = WalletSet::new(vec![a, b], 1).unwrap();
        assert_eq!(set.default_pubkey(), b_pub);

        assert!(matches!(
            set.set_default(2),
            Err(WalletError::IndexOutOfRange { index: 2, len: 2 })
        ));
        set.set_default(0).unwrap();
        assert_ne!(set.default_pubkey(), b_pub);

        assert!(matches!(WalletSet::new(vec![], 0), Err(WalletError::Empty)));
    }

    #[test]
    fn test_resolver_with_extra_signers() {
        let set = WalletSet::new(vec![Keypair::new()], 0).unwrap();
        let owner = Arc::new(Keypair::new());
        let resolver = set.resolver_with([owner.clone()]);
        assert!(resolver.contains(&set.default_pubkey()));
        assert!(resolver.contains(&owner.pubkey()));
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_debug_shows_only_public_keys() {
        let kp = Keypair::new();
        let secret = kp.to_base58_string();
        let set = WalletSet::new(vec![kp], 0).unwrap();
        let rendered = format!("{:?}", set);
        assert!(!rendered.contains(&secret));
        assert!(rendered.contains(&set.default_pubkey().to_string()));
    }
}
