//! solclient command line
//!
//! Thin wrapper over the library: loads the config and wallets, connects to
//! the cluster and runs one operation.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solclient::config::{Config, ProgramConfig};
use solclient::funding::airdrop_all;
use solclient::ocr2::{parse_identity, NewOracle, Ocr2Client};
use solclient::rpc_manager::SolanaNetwork;
use solclient::submit::{SubmissionEngine, SubmitSettings};
use solclient::wallet::{keypair_from_file, WalletSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "solclient.toml", env = "SOLCLIENT_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push an offchain configuration blob through begin / write / commit
    PushConfig {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        version: u64,
    },
    /// Read and log the aggregator state account
    DumpState,
    /// Airdrop `wallets.airdrop_sol` to every configured wallet
    Airdrop,
    /// Set the observation payment and billing access controller
    SetBilling {
        #[arg(long)]
        price: u32,
        #[arg(long)]
        controller: String,
    },
    /// Set the flagging threshold and validator program
    SetValidatorConfig {
        #[arg(long)]
        threshold: u32,
        #[arg(long)]
        validator: String,
    },
    /// Install a set of freshly generated test oracles sharing one payee
    SetOracles {
        #[arg(long, default_value_t = 5)]
        count: usize,
        #[arg(long, default_value_t = 1)]
        f: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), config = %args.config.display(), "Starting solclient");
    let config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let wallets = load_wallets(&config)?;
    info!(network = %config.network.name, wallets = wallets.len(), payer = %wallets.default_pubkey(), "Wallets loaded");

    let commitment = config.commitment()?;
    let network = Arc::new(
        SolanaNetwork::connect(
            &config.network.rpc_url,
            &config.network.ws_url,
            Duration::from_secs(30),
            commitment,
        )
        .await?,
    );
    let settings = SubmitSettings {
        commitment,
        confirm_timeout: config.transaction_timeout(),
        max_rebuilds: config.push.max_rebuilds,
        ..SubmitSettings::default()
    };
    let engine = Arc::new(SubmissionEngine::new(network.clone(), network, settings));

    match args.command {
        Command::Airdrop => {
            let funded = airdrop_all(&engine, &wallets.pubkeys(), config.wallets.airdrop_sol).await?;
            info!(funded, "Airdrops confirmed");
        }
        Command::PushConfig { file, version } => {
            let blob = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let client = ocr2_client(&config, engine, wallets)?;
            let report = client.set_offchain_config(&blob, version).await?;
            info!(
                version = report.version,
                bytes = report.bytes,
                chunks = report.writes.len(),
                commit = %report.commit,
                correlation_id = %report.correlation_id,
                "Configuration pushed"
            );
        }
        Command::DumpState => {
            ocr2_client(&config, engine, wallets)?.dump_state().await?;
        }
        Command::SetBilling { price, controller } => {
            let client = ocr2_client(&config, engine, wallets)?;
            client.set_billing(price, &controller).await?;
            client.wait_for_events().await?;
        }
        Command::SetValidatorConfig { threshold, validator } => {
            let client = ocr2_client(&config, engine, wallets)?;
            client.set_validator_config(threshold, &validator).await?;
            client.wait_for_events().await?;
        }
        Command::SetOracles { count, f } => {
            let client = ocr2_client(&config, engine, wallets)?;
            let oracles: Vec<NewOracle> = (0..count).map(|_| NewOracle::random()).collect();
            client.set_oracles(&oracles, f).await?;
            client.wait_for_events().await?;
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "solclient=debug,info"
    } else {
        "solclient=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

fn load_wallets(config: &Config) -> Result<WalletSet> {
    // Validated config guarantees at least one key source
    let mut wallets = if config.network.private_keys.is_empty() {
        let (first, rest) = config
            .wallets
            .keypair_paths
            .split_first()
            .context("No wallets configured")?;
        let mut set = WalletSet::new(vec![keypair_from_file(first)?], 0)?;
        set.extend_from_files(rest)?;
        set
    } else {
        let mut set = WalletSet::from_base58_keys(&config.network.private_keys, 0)?;
        set.extend_from_files(&config.wallets.keypair_paths)?;
        set
    };
    wallets.set_default(config.wallets.default_index)?;
    Ok(wallets)
}

fn ocr2_client(config: &Config, engine: Arc<SubmissionEngine>, wallets: WalletSet) -> Result<Ocr2Client> {
    let ProgramConfig {
        program_id,
        state_account,
        owner_keypair_path,
    } = config
        .program
        .as_ref()
        .context("[program] section is required for this command")?;

    let owner = keypair_from_file(owner_keypair_path)
        .with_context(|| format!("Failed to load owner keypair {owner_keypair_path}"))?;
    Ok(Ocr2Client::new(
        engine,
        wallets,
        Arc::new(owner),
        parse_identity(program_id)?,
        parse_identity(state_account)?,
        config.push.chunk_size,
    ))
}
