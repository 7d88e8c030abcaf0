//! Signer resolution
//!
//! Maps a public identity to the keypair that can sign for it. The candidate
//! set is fixed at construction (default payer, program owner and any
//! per-transaction throwaway keys); lookups are exact-match only and a miss is
//! reported as `None` so the builder can name the missing identity.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable identity → keypair mapping used at sign time
#[derive(Clone, Default)]
pub struct SignerResolver {
    keys: HashMap<Pubkey, Arc<Keypair>>,
}

impl SignerResolver {
    /// Create a resolver from a set of candidate keypairs
    ///
    /// Duplicate identities collapse to a single entry.
    pub fn new<I>(keypairs: I) -> Self
    where
        I: IntoIterator<Item = Arc<Keypair>>,
    {
        let keys = keypairs
            .into_iter()
            .map(|kp| (kp.pubkey(), kp))
            .collect();
        Self { keys }
    }

    /// Return a new resolver that additionally knows `extra`
    ///
    /// Used for throwaway account keys that only sign one unit; the receiver
    /// is left untouched.
    #[must_use]
    pub fn with_signers<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = Arc<Keypair>>,
    {
        let mut keys = self.keys.clone();
        keys.extend(extra.into_iter().map(|kp| (kp.pubkey(), kp)));
        Self { keys }
    }

    /// Look up the keypair for `pubkey`
    pub fn resolve(&self, pubkey: &Pubkey) -> Option<&Keypair> {
        self.keys.get(pubkey).map(Arc::as_ref)
    }

    /// Whether `pubkey` can be signed for
    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.keys.contains_key(pubkey)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for SignerResolver {
    // Only public identities; keypair bytes never reach the logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerResolver")
            .field("identities", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
