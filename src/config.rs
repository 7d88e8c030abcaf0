//! Configuration module
//!
//! TOML file with `[network]`, `[wallets]`, `[push]` and `[program]`
//! sections, `.env` loading and `SOLCLIENT_*` environment overrides.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest serialized transaction the network accepts
pub const PACKET_DATA_SIZE: usize = 1232;

/// Wire bytes of a `write_offchain_config` unit besides the chunk itself
///
/// Two signatures with their count (129), header (3), four account keys with
/// their count (129), blockhash (32), one compiled instruction with two
/// account indices and a two-byte data length (7), discriminator (8) and the
/// chunk length prefix (4).
pub const WRITE_OVERHEAD: usize = 312;

/// Largest chunk whose write unit still fits in one packet
pub const MAX_CHUNK_SIZE: usize = PACKET_DATA_SIZE - WRITE_OVERHEAD;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub fn category(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "io",
            ConfigError::Parse(_) => "parse",
            ConfigError::Invalid(_) => "invalid",
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,

    #[serde(default)]
    pub wallets: WalletsConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub program: Option<ProgramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_name")]
    pub name: String,

    pub rpc_url: String,

    pub ws_url: String,

    /// Base58 encoded 64-byte private keys
    #[serde(default)]
    pub private_keys: Vec<String>,

    /// Deadline for a single confirmation wait
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_secs: u64,

    /// `processed`, `confirmed` or `finalized`
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsConfig {
    /// Index of the fee-paying wallet
    #[serde(default = "default_wallet_index")]
    pub default_index: usize,

    /// SOL requested per wallet by `airdrop`
    #[serde(default = "default_airdrop_sol")]
    pub airdrop_sol: u64,

    /// Extra keypair files appended after `network.private_keys`
    #[serde(default)]
    pub keypair_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_rebuilds")]
    pub max_rebuilds: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub program_id: String,
    pub state_account: String,
    /// Keypair file of the program owner
    pub owner_keypair_path: String,
}

// Default value functions
fn default_network_name() -> String { "localnet".to_string() }
fn default_transaction_timeout() -> u64 { 60 }
fn default_commitment() -> String { "finalized".to_string() }
fn default_wallet_index() -> usize { 0 }
fn default_airdrop_sol() -> u64 { 5 }
fn default_chunk_size() -> usize { 800 }
fn default_max_rebuilds() -> usize { 3 }

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            default_index: default_wallet_index(),
            airdrop_sol: default_airdrop_sol(),
            keypair_paths: Vec::new(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_rebuilds: default_max_rebuilds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                name: default_network_name(),
                rpc_url: "http://127.0.0.1:8899".to_string(),
                ws_url: "ws://127.0.0.1:8900".to_string(),
                private_keys: Vec::new(),
                transaction_timeout_secs: default_transaction_timeout(),
                commitment: default_commitment(),
            },
            wallets: WalletsConfig::default(),
            push: PushConfig::default(),
            program: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `.env`, the file, then apply `SOLCLIENT_*` overrides and validate
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`; takes a closure so tests need not touch
    /// the process environment
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SOLCLIENT_RPC_URL") {
            self.network.rpc_url = url;
        }
        if let Some(url) = lookup("SOLCLIENT_WS_URL") {
            self.network.ws_url = url;
        }
        if let Some(timeout) = lookup("SOLCLIENT_TRANSACTION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.network.transaction_timeout_secs = timeout;
        }
        if let Some(keys) = lookup("SOLCLIENT_PRIVATE_KEYS") {
            self.network.private_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let wallet_count = self.network.private_keys.len() + self.wallets.keypair_paths.len();
        if wallet_count == 0 {
            return Err(ConfigError::Invalid("no private keys or keypair paths configured".to_string()));
        }
        if self.wallets.default_index >= wallet_count {
            return Err(ConfigError::Invalid(format!(
                "wallets.default_index {} out of range ({} wallets)",
                self.wallets.default_index, wallet_count
            )));
        }
        if self.network.transaction_timeout_secs == 0 {
            return Err(ConfigError::Invalid("network.transaction_timeout_secs must be > 0".to_string()));
        }
        if self.push.chunk_size == 0 || self.push.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "push.chunk_size must be in 1..={}, got {}",
                MAX_CHUNK_SIZE, self.push.chunk_size
            )));
        }
        self.commitment()?;
        Ok(())
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        match self.network.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(ConfigError::Invalid(format!("unknown commitment '{other}'"))),
        }
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.network.transaction_timeout_secs)
    }
}
