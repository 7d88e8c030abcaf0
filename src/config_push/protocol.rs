//! Begin / write / commit state machine
//!
//! `Idle -> Begun -> Writing* -> Committed`. Every phase is one
//! `execute_sync` at finalized commitment, so each transaction is built on a
//! blockhash fetched after the previous phase finalized. A failure moves the
//! push to `Aborted`; a new attempt starts from `begin` on a fresh `ConfigPush`.

use crate::config_push::chunks::split_config;
use crate::config_push::errors::{ConfigPushError, PushStep};
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::submit::SubmissionEngine;
use crate::tx_builder::SignerResolver;
use solana_sdk::{
    commitment_config::CommitmentConfig, instruction::Instruction, pubkey::Pubkey,
    signature::Signature,
};
use tracing::{debug, info, Instrument};

/// Instruction factory for one staging-buffer program
pub trait ConfigInstructionSet: Send + Sync {
    /// Declare `version` and reset the staging buffer
    fn begin(&self, version: u64) -> Instruction;
    /// Append `chunk` to the staging buffer
    fn write(&self, chunk: &[u8]) -> Instruction;
    /// Validate the staging buffer and publish it
    fn commit(&self) -> Instruction;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    Idle,
    Begun,
    Writing { written: usize },
    Committed,
    Aborted,
}

/// Summary of a committed push
#[derive(Debug, Clone)]
pub struct PushReport {
    pub version: u64,
    pub bytes: usize,
    pub begin: Signature,
    pub writes: Vec<Signature>,
    pub commit: Signature,
    pub correlation_id: String,
    /// One child context per submitted phase, in submission order
    pub phase_traces: Vec<TraceContext>,
}

/// One configuration push against one staging buffer
pub struct ConfigPush<'a> {
    engine: &'a SubmissionEngine,
    program: &'a dyn ConfigInstructionSet,
    payer: Pubkey,
    resolver: &'a SignerResolver,
    phase: PushPhase,
    trace: TraceContext,
    phase_traces: Vec<TraceContext>,
    version: u64,
    begin: Option<Signature>,
    writes: Vec<Signature>,
    bytes: usize,
}

impl<'a> ConfigPush<'a> {
    pub fn new(
        engine: &'a SubmissionEngine,
        program: &'a dyn ConfigInstructionSet,
        payer: Pubkey,
        resolver: &'a SignerResolver,
    ) -> Self {
        Self {
            engine,
            program,
            payer,
            resolver,
            phase: PushPhase::Idle,
            trace: TraceContext::new("push_config"),
            phase_traces: Vec::new(),
            version: 0,
            begin: None,
            writes: Vec::new(),
            bytes: 0,
        }
    }

    pub fn phase(&self) -> PushPhase {
        self.phase
    }

    pub fn correlation_id(&self) -> &str {
        self.trace.correlation_id.as_str()
    }

    /// Run the whole protocol for `blob`
    ///
    /// # Errors
    ///
    /// `EmptyPayload` / `InvalidChunkSize` before anything is sent; otherwise
    /// `Phase` naming the step that failed.
    pub async fn run(mut self, blob: &[u8], version: u64, chunk_size: usize) -> Result<PushReport, ConfigPushError> {
        if blob.is_empty() {
            return Err(ConfigPushError::EmptyPayload);
        }
        if chunk_size == 0 {
            return Err(ConfigPushError::InvalidChunkSize { chunk_size });
        }

        let span = self.trace.span();
        async move {
            let chunks = split_config(blob, chunk_size);
            info!(version, bytes = blob.len(), chunks = chunks.len(), "Pushing configuration");

            self.begin(version).await?;
            for chunk in chunks {
                self.write(chunk).await?;
            }
            self.commit().await
        }
        .instrument(span)
        .await
    }

    pub async fn begin(&mut self, version: u64) -> Result<Signature, ConfigPushError> {
        self.expect_phase(PushStep::Begin, matches!(self.phase, PushPhase::Idle))?;

        let ix = self.program.begin(version);
        let signature = self.step(PushStep::Begin, "Begin config".to_string(), ix).await?;

        self.version = version;
        self.begin = Some(signature);
        self.phase = PushPhase::Begun;
        debug!(version, signature = %signature, "Staging buffer reset");
        Ok(signature)
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<Signature, ConfigPushError> {
        let written = match self.phase {
            PushPhase::Begun => 0,
            PushPhase::Writing { written } => written,
            _ => return Err(self.out_of_order(PushStep::Write { index: self.writes.len() })),
        };
        let step = PushStep::Write { index: written };

        let ix = self.program.write(chunk);
        let label = format!("Write config chunk {}", written);
        let signature = self.step(step, label, ix).await?;

        metrics().config_chunks_written.inc();
        self.writes.push(signature);
        self.bytes += chunk.len();
        self.phase = PushPhase::Writing { written: written + 1 };
        debug!(chunk_index = written, chunk_len = chunk.len(), signature = %signature, "Chunk written");
        Ok(signature)
    }

    pub async fn commit(&mut self) -> Result<PushReport, ConfigPushError> {
        let begin = match (self.phase, self.begin) {
            (PushPhase::Begun | PushPhase::Writing { .. }, Some(begin)) => begin,
            _ => return Err(self.out_of_order(PushStep::Commit)),
        };

        let ix = self.program.commit();
        let signature = self.step(PushStep::Commit, "Commit config".to_string(), ix).await?;

        self.phase = PushPhase::Committed;
        metrics().config_pushes_committed.inc();
        info!(
            version = self.version,
            chunks = self.writes.len(),
            bytes = self.bytes,
            signature = %signature,
            "Configuration committed"
        );

        Ok(PushReport {
            version: self.version,
            bytes: self.bytes,
            begin,
            writes: std::mem::take(&mut self.writes),
            commit: signature,
            correlation_id: self.trace.correlation_id.to_string(),
            phase_traces: std::mem::take(&mut self.phase_traces),
        })
    }

    async fn step(&mut self, step: PushStep, label: String, ix: Instruction) -> Result<Signature, ConfigPushError> {
        let trace = self.trace.child_span(&step.to_string());
        let span = trace.span();
        self.phase_traces.push(trace);

        let result = self
            .engine
            .execute_sync_with_commitment(
                &label,
                vec![ix],
                &self.payer,
                self.resolver,
                CommitmentConfig::finalized(),
            )
            .instrument(span)
            .await;

        result.map_err(|source| {
            self.phase = PushPhase::Aborted;
            ConfigPushError::Phase { step, source }
        })
    }

    fn expect_phase(&self, step: PushStep, ok: bool) -> Result<(), ConfigPushError> {
        if ok {
            Ok(())
        } else {
            Err(self.out_of_order(step))
        }
    }

    fn out_of_order(&self, step: PushStep) -> ConfigPushError {
        ConfigPushError::OutOfOrder {
            step,
            phase: self.phase,
        }
    }
}
