//! Test Utilities Module
//!
//! `MockNetwork` is an in-memory ledger implementing both halves of the
//! network interface: it verifies signatures, rotates blockhashes once per
//! landed slot, runs registered program executors against account data at
//! send time, reports confirmations after a configurable latency, and records
//! an ordered event log for assertions.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::ocr2::{account_discriminator, instruction_discriminator};
use crate::rpc_manager::{LedgerRpc, RpcManagerError, SignatureFeed, SignatureNotification};
use crate::state_reader::ACCOUNT_DISCRIMINATOR_LEN;
use crate::submit::{SubmissionEngine, SubmitSettings};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

pub const MOCK_ENDPOINT: &str = "mock://ledger";

/// Blockhashes stay valid for this many landed slots
pub const BLOCKHASH_WINDOW: usize = 150;

/// On-chain program stand-in, run synchronously inside `send_transaction`
pub trait ProgramExecutor: Send + Sync {
    /// Apply one instruction to `state`; `Err` aborts the whole transaction
    fn execute(
        &self,
        accounts: &[Pubkey],
        data: &[u8],
        state: &mut HashMap<Pubkey, Vec<u8>>,
    ) -> Result<(), String>;
}

/// Entry in the mock's ordered event log
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Sent {
        signature: Signature,
        /// `(program_id, data)` per instruction
        instructions: Vec<(Pubkey, Vec<u8>)>,
        at: Instant,
    },
    Confirmed {
        signature: Signature,
        at: Instant,
    },
    Airdrop {
        pubkey: Pubkey,
        lamports: u64,
        signature: Signature,
    },
}

struct Landed {
    slot: u64,
    error: Option<String>,
}

struct MockState {
    /// Oldest first; the back is the one `latest_blockhash` serves
    valid_blockhashes: VecDeque<Hash>,
    stale_blockhashes: usize,
    accounts: HashMap<Pubkey, Vec<u8>>,
    executors: HashMap<Pubkey, Arc<dyn ProgramExecutor>>,
    landed: HashMap<Signature, Landed>,
    send_rejections: VecDeque<RpcManagerError>,
    execution_failures: VecDeque<String>,
    failing_airdrops: HashSet<Pubkey>,
    silent: HashSet<Signature>,
    latency_overrides: HashMap<Signature, Duration>,
    events: Vec<NetworkEvent>,
    slot: u64,
    airdrops: u64,
}

/// In-memory ledger for deterministic tests
pub struct MockNetwork {
    state: Mutex<MockState>,
    latency: Mutex<Duration>,
    live_subscriptions: Arc<AtomicUsize>,
}

/// Counts one open signature subscription until dropped
struct LiveSubscription(Arc<AtomicUsize>);

impl LiveSubscription {
    fn open(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                valid_blockhashes: VecDeque::from([Hash::new_unique()]),
                stale_blockhashes: 0,
                accounts: HashMap::new(),
                executors: HashMap::new(),
                landed: HashMap::new(),
                send_rejections: VecDeque::new(),
                execution_failures: VecDeque::new(),
                failing_airdrops: HashSet::new(),
                silent: HashSet::new(),
                latency_overrides: HashMap::new(),
                events: Vec::new(),
                slot: 0,
                airdrops: 0,
            }),
            latency: Mutex::new(Duration::from_millis(400)),
            live_subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Confirmation latency for every signature
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Engine wired to this mock for both network halves
    pub fn engine(self: &Arc<Self>, settings: SubmitSettings) -> SubmissionEngine {
        SubmissionEngine::new(self.clone(), self.clone(), settings)
    }

    pub fn register_program(&self, program_id: Pubkey, executor: Arc<dyn ProgramExecutor>) {
        self.state.lock().executors.insert(program_id, executor);
    }

    pub fn set_account(&self, pubkey: Pubkey, data: Vec<u8>) {
        self.state.lock().accounts.insert(pubkey, data);
    }

    pub fn account(&self, pubkey: &Pubkey) -> Option<Vec<u8>> {
        self.state.lock().accounts.get(pubkey).cloned()
    }

    /// Age out every issued blockhash and start serving a new one
    pub fn expire_blockhash(&self) -> Hash {
        let mut state = self.state.lock();
        let current = Hash::new_unique();
        state.valid_blockhashes.clear();
        state.valid_blockhashes.push_back(current);
        current
    }

    /// Blockhash `latest_blockhash` currently serves
    pub fn current_blockhash(&self) -> Hash {
        Self::current(&self.state.lock())
    }

    /// Signature subscriptions opened and not yet released
    pub fn live_subscriptions(&self) -> usize {
        self.live_subscriptions.load(Ordering::SeqCst)
    }

    /// The next `count` blockhash fetches return an already expired hash
    pub fn serve_stale_blockhashes(&self, count: usize) {
        self.state.lock().stale_blockhashes = count;
    }

    /// Reject the next send with `error` before any other check
    pub fn reject_next_send(&self, error: RpcManagerError) {
        self.state.lock().send_rejections.push_back(error);
    }

    /// The next accepted transaction lands with `reason` and no effect
    pub fn fail_next_execution(&self, reason: impl Into<String>) {
        self.state.lock().execution_failures.push_back(reason.into());
    }

    pub fn fail_airdrop_for(&self, pubkey: Pubkey) {
        self.state.lock().failing_airdrops.insert(pubkey);
    }

    /// Never notify for `signature`
    pub fn silence(&self, signature: Signature) {
        self.state.lock().silent.insert(signature);
    }

    /// Per-signature confirmation latency
    pub fn delay_confirmation(&self, signature: Signature, latency: Duration) {
        self.state.lock().latency_overrides.insert(signature, latency);
    }

    pub fn events(&self) -> Vec<NetworkEvent> {
        self.state.lock().events.clone()
    }

    /// Instruction data of every sent transaction, in send order
    pub fn sent_instructions(&self) -> Vec<Vec<(Pubkey, Vec<u8>)>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                NetworkEvent::Sent { instructions, .. } => Some(instructions.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent_instructions().len()
    }

    fn current(state: &MockState) -> Hash {
        state.valid_blockhashes.back().copied().unwrap_or_default()
    }

    /// Advance one slot; each slot brings a new blockhash
    fn next_slot(state: &mut MockState) -> u64 {
        state.slot += 1;
        state.valid_blockhashes.push_back(Hash::new_unique());
        while state.valid_blockhashes.len() > BLOCKHASH_WINDOW {
            state.valid_blockhashes.pop_front();
        }
        state.slot
    }

    fn execute(state: &mut MockState, tx: &Transaction) -> Option<String> {
        if let Some(reason) = state.execution_failures.pop_front() {
            return Some(reason);
        }

        let keys = &tx.message.account_keys;
        let mut working = state.accounts.clone();
        for (index, ix) in tx.message.instructions.iter().enumerate() {
            let Some(program_id) = keys.get(usize::from(ix.program_id_index)) else {
                return Some(format!("Error processing Instruction {index}: invalid program index"));
            };
            let accounts: Vec<Pubkey> = ix
                .accounts
                .iter()
                .filter_map(|&i| keys.get(usize::from(i)).copied())
                .collect();

            if let Some(executor) = state.executors.get(program_id).cloned() {
                if let Err(reason) = executor.execute(&accounts, &ix.data, &mut working) {
                    return Some(format!("Error processing Instruction {index}: {reason}"));
                }
            }
        }
        state.accounts = working;
        None
    }
}

#[async_trait]
impl LedgerRpc for MockNetwork {
    async fn latest_blockhash(&self, _commitment: CommitmentConfig) -> Result<Hash, RpcManagerError> {
        let mut state = self.state.lock();
        if state.stale_blockhashes > 0 {
            state.stale_blockhashes -= 1;
            return Ok(Hash::new_unique());
        }
        Ok(Self::current(&state))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, RpcManagerError> {
        let mut state = self.state.lock();

        if tx.verify().is_err() {
            return Err(RpcManagerError::RpcResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
                message: "Transaction signature verification failure".to_string(),
                code: Some(-32003),
            });
        }
        if let Some(err) = state.send_rejections.pop_front() {
            return Err(err);
        }
        if !state.valid_blockhashes.contains(&tx.message.recent_blockhash) {
            return Err(RpcManagerError::BlockhashNotFound {
                endpoint: MOCK_ENDPOINT.to_string(),
            });
        }

        let signature = tx.signatures.first().copied().unwrap_or_default();
        if state.landed.contains_key(&signature) {
            return Err(RpcManagerError::AlreadyProcessed {
                endpoint: MOCK_ENDPOINT.to_string(),
            });
        }

        let error = Self::execute(&mut state, tx);
        let slot = Self::next_slot(&mut state);
        state.landed.insert(signature, Landed { slot, error });

        let instructions = tx
            .message
            .instructions
            .iter()
            .map(|ix| {
                let program = tx
                    .message
                    .account_keys
                    .get(usize::from(ix.program_id_index))
                    .copied()
                    .unwrap_or_default();
                (program, ix.data.clone())
            })
            .collect();
        state.events.push(NetworkEvent::Sent {
            signature,
            instructions,
            at: Instant::now(),
        });
        Ok(signature)
    }

    async fn account_data(&self, pubkey: &Pubkey) -> Result<Vec<u8>, RpcManagerError> {
        self.account(pubkey).ok_or_else(|| RpcManagerError::AccountNotFound {
            account: pubkey.to_string(),
            endpoint: MOCK_ENDPOINT.to_string(),
        })
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcManagerError> {
        Ok((data_len as u64 + 128) * 6960)
    }

    async fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, RpcManagerError> {
        let mut state = self.state.lock();
        if state.failing_airdrops.contains(pubkey) {
            return Err(RpcManagerError::RpcResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
                message: "airdrop request failed".to_string(),
                code: Some(-32600),
            });
        }

        state.airdrops += 1;
        let mut bytes = [0xA1u8; 64];
        bytes[..8].copy_from_slice(&state.airdrops.to_le_bytes());
        let signature = Signature::from(bytes);

        let slot = Self::next_slot(&mut state);
        state.landed.insert(signature, Landed { slot, error: None });
        state.events.push(NetworkEvent::Airdrop {
            pubkey: *pubkey,
            lamports,
            signature,
        });
        Ok(signature)
    }
}

#[async_trait]
impl SignatureFeed for MockNetwork {
    async fn next_notification(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
        deadline: Duration,
    ) -> Result<SignatureNotification, RpcManagerError> {
        let _subscription = LiveSubscription::open(&self.live_subscriptions);
        let (landed, latency) = {
            let state = self.state.lock();
            let landed = if state.silent.contains(signature) {
                None
            } else {
                state.landed.get(signature).map(|l| (l.slot, l.error.clone()))
            };
            let latency = state
                .latency_overrides
                .get(signature)
                .copied()
                .unwrap_or(*self.latency.lock());
            (landed, latency)
        };

        let Some((slot, error)) = landed else {
            tokio::time::sleep(deadline).await;
            return Ok(SignatureNotification::DeadlineElapsed);
        };

        if timeout(deadline, tokio::time::sleep(latency)).await.is_err() {
            return Ok(SignatureNotification::DeadlineElapsed);
        }
        self.state.lock().events.push(NetworkEvent::Confirmed {
            signature: *signature,
            at: Instant::now(),
        });

        Ok(match error {
            None => SignatureNotification::Reached { slot },
            Some(reason) => SignatureNotification::ExecutionFailed { slot, reason },
        })
    }
}

/// Account layout the staging program keeps behind the `State` discriminator
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingAccount {
    pub version: u64,
    pub begun: bool,
    pub staging: Vec<u8>,
    pub active_version: u64,
    pub active: Vec<u8>,
    pub f: u8,
    pub transmitters: Vec<Pubkey>,
    pub payees: Vec<Pubkey>,
}

fn read_u32(args: &[u8], at: usize) -> Option<usize> {
    args.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(|b| u32::from_le_bytes(b) as usize)
}

fn read_pubkey(args: &[u8], at: usize) -> Option<Pubkey> {
    args.get(at..at + 32)
        .and_then(|b| <[u8; 32]>::try_from(b).ok())
        .map(Pubkey::new_from_array)
}

impl StagingAccount {
    pub fn encode(&self) -> Vec<u8> {
        let mut data = account_discriminator("State").to_vec();
        data.extend(bincode::serialize(self).unwrap_or_default());
        data
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        data.get(ACCOUNT_DISCRIMINATOR_LEN..)
            .and_then(|body| bincode::deserialize(body).ok())
    }
}

/// Executor for the aggregator's config and oracle instructions
#[derive(Debug, Default)]
pub struct StagingProgram {
    /// Reject writes that would grow the buffer past this size
    pub max_buffer: Option<usize>,
}

impl ProgramExecutor for StagingProgram {
    fn execute(
        &self,
        accounts: &[Pubkey],
        data: &[u8],
        state: &mut HashMap<Pubkey, Vec<u8>>,
    ) -> Result<(), String> {
        if data.len() < 8 {
            return Err("instruction data too short".to_string());
        }
        let (discriminator, args) = data.split_at(8);
        let account = accounts.first().ok_or("missing state account")?;
        let mut staging = state
            .get(account)
            .and_then(|d| StagingAccount::decode(d))
            .unwrap_or_default();

        if discriminator == instruction_discriminator("begin_offchain_config") {
            let version = args
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .map(u64::from_le_bytes)
                .ok_or("bad version")?;
            staging.version = version;
            staging.begun = true;
            staging.staging.clear();
        } else if discriminator == instruction_discriminator("write_offchain_config") {
            if !staging.begun {
                return Err("config not begun".to_string());
            }
            let len = args
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes)
                .ok_or("bad length prefix")? as usize;
            let chunk = args.get(4..4 + len).ok_or("truncated chunk")?;
            if chunk.is_empty() {
                return Err("empty chunk".to_string());
            }
            if let Some(max) = self.max_buffer {
                if staging.staging.len() + chunk.len() > max {
                    return Err("staging buffer full".to_string());
                }
            }
            staging.staging.extend_from_slice(chunk);
        } else if discriminator == instruction_discriminator("commit_offchain_config") {
            if !staging.begun || staging.staging.is_empty() {
                return Err("nothing to commit".to_string());
            }
            staging.active = std::mem::take(&mut staging.staging);
            staging.active_version = staging.version;
            staging.begun = false;
        } else if discriminator == instruction_discriminator("set_config") {
            let count = read_u32(args, 0).ok_or("bad oracle count")?;
            let transmitters = (0..count)
                .map(|i| read_pubkey(args, 4 + i * 52 + 20))
                .collect::<Option<Vec<_>>>()
                .ok_or("truncated oracle list")?;
            staging.f = *args.get(4 + count * 52).ok_or("missing f")?;
            staging.transmitters = transmitters;
            staging.payees.clear();
        } else if discriminator == instruction_discriminator("set_payees") {
            let count = read_u32(args, 0).ok_or("bad payee count")?;
            if count != staging.transmitters.len() {
                return Err("payee count does not match oracles".to_string());
            }
            staging.payees = (0..count)
                .map(|i| read_pubkey(args, 4 + i * 32))
                .collect::<Option<Vec<_>>>()
                .ok_or("truncated payee list")?;
        } else if discriminator == instruction_discriminator("set_billing")
            || discriminator == instruction_discriminator("set_validator_config")
        {
            // Owner-only setters leave the staging state untouched
        } else {
            return Err(format!("unknown instruction {}", hex::encode(discriminator)));
        }

        state.insert(*account, staging.encode());
        Ok(())
    }
}
