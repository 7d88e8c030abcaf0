//! OCR2 aggregator program client
//!
//! Anchor-encoded instructions for the aggregator's staging-buffer
//! configuration and the owner-only setters, plus a context object that
//! carries the engine, wallets and owner key explicitly.

use crate::config_push::{ConfigInstructionSet, ConfigPush, ConfigPushError, PushReport};
use crate::funding::{create_account_instruction, FundingError};
use crate::state_reader::{StateReadError, StateReader, ACCOUNT_DISCRIMINATOR_LEN};
use crate::submit::{SubmissionEngine, SubmitError};
use crate::tx_builder::SignerResolver;
use crate::wallet::WalletSet;
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// SPL token program; owns the payee accounts
pub const TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Size of an SPL token account
pub const TOKEN_ACCOUNT_LEN: u64 = 165;

/// One entry of the aggregator's oracle set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOracle {
    /// Ethereum-style address of the report signing key
    pub signer: [u8; 20],
    pub transmitter: Pubkey,
}

impl NewOracle {
    /// Random signing address and a fresh transmitter key
    pub fn random() -> Self {
        let mut signer = [0u8; 20];
        signer.copy_from_slice(&Keypair::new().pubkey().to_bytes()[..20]);
        Self {
            signer,
            transmitter: Keypair::new().pubkey(),
        }
    }
}

/// `sha256("global:<name>")[..8]`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    anchor_hash("global", name)
}

/// `sha256("account:<Name>")[..8]`
pub fn account_discriminator(name: &str) -> [u8; 8] {
    anchor_hash("account", name)
}

fn anchor_hash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Ocr2Error {
    /// A caller-supplied address is not a valid public key
    #[error("Invalid identity '{input}': {reason}")]
    InvalidIdentity { input: String, reason: String },

    #[error(transparent)]
    Push(#[from] ConfigPushError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    State(#[from] StateReadError),

    #[error(transparent)]
    Funding(#[from] FundingError),
}

impl Ocr2Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Ocr2Error::InvalidIdentity { .. } => false,
            Ocr2Error::Push(e) => e.is_retryable(),
            Ocr2Error::Submit(e) => e.is_retryable(),
            Ocr2Error::State(e) => e.is_retryable(),
            Ocr2Error::Funding(e) => e.is_retryable(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Ocr2Error::InvalidIdentity { .. } => "invalid_identity",
            Ocr2Error::Push(e) => e.category(),
            Ocr2Error::Submit(e) => e.category(),
            Ocr2Error::State(e) => e.category(),
            Ocr2Error::Funding(e) => e.category(),
        }
    }
}

/// Parse a base58 address; malformed input is fatal
pub fn parse_identity(input: &str) -> Result<Pubkey, Ocr2Error> {
    Pubkey::from_str(input.trim()).map_err(|e| Ocr2Error::InvalidIdentity {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Instruction factory bound to one program, state account and authority
#[derive(Debug, Clone)]
pub struct Ocr2Instructions {
    pub program_id: Pubkey,
    pub state: Pubkey,
    pub authority: Pubkey,
}

impl Ocr2Instructions {
    fn owner_instruction(&self, name: &str, args: &[u8], extra: Option<Pubkey>) -> Instruction {
        let mut data = instruction_discriminator(name).to_vec();
        data.extend_from_slice(args);

        let mut accounts = vec![
            AccountMeta::new(self.state, false),
            AccountMeta::new_readonly(self.authority, true),
        ];
        if let Some(account) = extra {
            accounts.push(AccountMeta::new_readonly(account, false));
        }
        Instruction::new_with_bytes(self.program_id, &data, accounts)
    }

    pub fn begin_offchain_config(&self, version: u64) -> Instruction {
        self.owner_instruction("begin_offchain_config", &version.to_le_bytes(), None)
    }

    pub fn write_offchain_config(&self, chunk: &[u8]) -> Instruction {
        let mut args = Vec::with_capacity(4 + chunk.len());
        args.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        args.extend_from_slice(chunk);
        self.owner_instruction("write_offchain_config", &args, None)
    }

    pub fn commit_offchain_config(&self) -> Instruction {
        self.owner_instruction("commit_offchain_config", &[], None)
    }

    pub fn set_billing(&self, observation_payment: u32, access_controller: Pubkey) -> Instruction {
        self.owner_instruction(
            "set_billing",
            &observation_payment.to_le_bytes(),
            Some(access_controller),
        )
    }

    pub fn set_validator_config(&self, flagging_threshold: u32, validator: Pubkey) -> Instruction {
        self.owner_instruction(
            "set_validator_config",
            &flagging_threshold.to_le_bytes(),
            Some(validator),
        )
    }

    /// Anchor `set_config(new_oracles: Vec<NewOracle>, f: u8)`
    pub fn set_config(&self, oracles: &[NewOracle], f: u8) -> Instruction {
        let mut args = Vec::with_capacity(4 + oracles.len() * 52 + 1);
        args.extend_from_slice(&(oracles.len() as u32).to_le_bytes());
        for oracle in oracles {
            args.extend_from_slice(&oracle.signer);
            args.extend_from_slice(oracle.transmitter.as_ref());
        }
        args.push(f);
        self.owner_instruction("set_config", &args, None)
    }

    /// Anchor `set_payees(payees: Vec<Pubkey>)`, one payee per oracle in order
    pub fn set_payees(&self, payees: &[Pubkey]) -> Instruction {
        let mut args = Vec::with_capacity(4 + payees.len() * 32);
        args.extend_from_slice(&(payees.len() as u32).to_le_bytes());
        for payee in payees {
            args.extend_from_slice(payee.as_ref());
        }
        self.owner_instruction("set_payees", &args, None)
    }
}

impl ConfigInstructionSet for Ocr2Instructions {
    fn begin(&self, version: u64) -> Instruction {
        self.begin_offchain_config(version)
    }

    fn write(&self, chunk: &[u8]) -> Instruction {
        self.write_offchain_config(chunk)
    }

    fn commit(&self) -> Instruction {
        self.commit_offchain_config()
    }
}

/// Aggregator client context
pub struct Ocr2Client {
    engine: Arc<SubmissionEngine>,
    wallets: WalletSet,
    owner: Arc<Keypair>,
    instructions: Ocr2Instructions,
    reader: StateReader,
    chunk_size: usize,
}

impl Ocr2Client {
    pub fn new(
        engine: Arc<SubmissionEngine>,
        wallets: WalletSet,
        owner: Arc<Keypair>,
        program_id: Pubkey,
        state: Pubkey,
        chunk_size: usize,
    ) -> Self {
        let reader = StateReader::new(Arc::clone(engine.rpc()));
        let instructions = Ocr2Instructions {
            program_id,
            state,
            authority: owner.pubkey(),
        };
        Self {
            engine,
            wallets,
            owner,
            instructions,
            reader,
            chunk_size,
        }
    }

    pub fn instructions(&self) -> &Ocr2Instructions {
        &self.instructions
    }

    pub fn engine(&self) -> &SubmissionEngine {
        &self.engine
    }

    fn resolver(&self) -> SignerResolver {
        self.wallets.resolver_with([Arc::clone(&self.owner)])
    }

    /// Push `blob` through begin / write / commit
    pub async fn set_offchain_config(&self, blob: &[u8], version: u64) -> Result<PushReport, Ocr2Error> {
        let resolver = self.resolver();
        let push = ConfigPush::new(
            &self.engine,
            &self.instructions,
            self.wallets.default_pubkey(),
            &resolver,
        );
        Ok(push.run(blob, version, self.chunk_size).await?)
    }

    /// Submit `set_billing` for tracking; wait with [`Self::wait_for_events`]
    pub async fn set_billing(&self, observation_payment: u32, access_controller: &str) -> Result<Signature, Ocr2Error> {
        let controller = parse_identity(access_controller)?;
        let ix = self.instructions.set_billing(observation_payment, controller);
        Ok(self
            .engine
            .execute_async("Set billing", vec![ix], &self.wallets.default_pubkey(), &self.resolver())
            .await?)
    }

    /// Submit `set_validator_config` for tracking
    pub async fn set_validator_config(&self, flagging_threshold: u32, validator: &str) -> Result<Signature, Ocr2Error> {
        let validator = parse_identity(validator)?;
        let ix = self.instructions.set_validator_config(flagging_threshold, validator);
        Ok(self
            .engine
            .execute_async(
                "Set validator config",
                vec![ix],
                &self.wallets.default_pubkey(),
                &self.resolver(),
            )
            .await?)
    }

    /// Install `oracles` with fault tolerance `f`, all paid to one new payee account
    ///
    /// One tracked unit: create the payee account, `set_config`, `set_payees`.
    /// Signed by the fee payer, the owner and the throwaway payee key.
    pub async fn set_oracles(&self, oracles: &[NewOracle], f: u8) -> Result<Signature, Ocr2Error> {
        info!(
            program = %self.instructions.program_id,
            oracles = oracles.len(),
            f,
            "Setting oracles"
        );
        let payer = self.wallets.default_pubkey();
        let payee = Arc::new(Keypair::new());
        let create_payee = create_account_instruction(
            self.engine.rpc().as_ref(),
            &payer,
            &payee.pubkey(),
            TOKEN_ACCOUNT_LEN,
            &TOKEN_PROGRAM_ID,
        )
        .await?;
        let payees = vec![payee.pubkey(); oracles.len()];

        let instructions = vec![
            create_payee,
            self.instructions.set_config(oracles, f),
            self.instructions.set_payees(&payees),
        ];
        let resolver = self.resolver().with_signers([payee]);
        Ok(self
            .engine
            .execute_async("Set oracles with associated payees", instructions, &payer, &resolver)
            .await?)
    }

    /// Barrier over every tracked submission
    pub async fn wait_for_events(&self) -> Result<usize, Ocr2Error> {
        Ok(self.engine.barrier().await?)
    }

    /// Read the state account and log a summary of it
    pub async fn dump_state(&self) -> Result<Vec<u8>, Ocr2Error> {
        let data = self.reader.read(&self.instructions.state).await?;
        let discriminator = data.get(..ACCOUNT_DISCRIMINATOR_LEN).unwrap_or(&data[..]);

        if discriminator != account_discriminator("State") {
            warn!(
                state = %self.instructions.state,
                discriminator = %hex::encode(discriminator),
                "State account discriminator does not match"
            );
        }
        info!(
            state = %self.instructions.state,
            len = data.len(),
            discriminator = %hex::encode(discriminator),
            head = %hex::encode(&data[..data.len().min(64)]),
            "State dump"
        );
        Ok(data)
    }
}
