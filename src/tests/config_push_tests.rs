use super::fixtures::Harness;
use crate::config_push::{ConfigPush, ConfigPushError, PushPhase, PushStep};
use crate::ocr2::instruction_discriminator;
use crate::submit::{SubmitError, SubmitSettings};
use crate::test_utils::{MockNetwork, NetworkEvent, StagingAccount, StagingProgram};
use solana_sdk::signature::{Signature, Signer};

fn staging_state(h: &Harness) -> StagingAccount {
    h.network
        .account(&h.program.state)
        .and_then(|d| StagingAccount::decode(&d))
        .unwrap_or_default()
}

/// Instruction names in send order, decoded from discriminators
fn sent_phases(h: &Harness) -> Vec<&'static str> {
    let names = ["begin_offchain_config", "write_offchain_config", "commit_offchain_config"];
    h.network
        .sent_instructions()
        .iter()
        .filter_map(|ixs| ixs.first())
        .filter(|(program, _)| *program == h.program.program_id)
        .filter_map(|(_, data)| {
            names
                .iter()
                .find(|name| data[..8] == instruction_discriminator(name))
                .copied()
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_push_2400_bytes_in_800_byte_chunks() {
    let h = Harness::new();
    let blob: Vec<u8> = (0..2400u32).map(|i| (i % 251) as u8).collect();

    let report = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver)
        .run(&blob, 1, 800)
        .await
        .unwrap();

    assert_eq!(report.version, 1);
    assert_eq!(report.writes.len(), 3);
    assert_eq!(report.bytes, 2400);
    assert_eq!(
        sent_phases(&h),
        vec![
            "begin_offchain_config",
            "write_offchain_config",
            "write_offchain_config",
            "write_offchain_config",
            "commit_offchain_config",
        ]
    );

    let writes: Vec<usize> = h
        .network
        .sent_instructions()
        .iter()
        .filter_map(|ixs| ixs.first())
        .filter(|(_, data)| data[..8] == instruction_discriminator("write_offchain_config"))
        .map(|(_, data)| data.len() - 12)
        .collect();
    assert_eq!(writes, vec![800, 800, 800]);

    let state = staging_state(&h);
    assert_eq!(state.active.len(), 2400);
    assert_eq!(state.active, blob);
    assert_eq!(state.active_version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_phase_finalizes_before_the_next_is_sent() {
    let h = Harness::new();
    let blob = vec![3u8; 1700];

    ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver)
        .run(&blob, 4, 800)
        .await
        .unwrap();

    // Strict alternation: every Sent is confirmed before the next Sent
    let mut pending: Option<Signature> = None;
    let mut last_at = None;
    let mut sends = 0;
    for event in h.network.events() {
        match event {
            NetworkEvent::Sent { signature, at, .. } => {
                assert!(pending.is_none(), "sent before previous phase confirmed");
                if let Some(prev) = last_at {
                    assert!(at >= prev);
                }
                pending = Some(signature);
                last_at = Some(at);
                sends += 1;
            }
            NetworkEvent::Confirmed { signature, at } => {
                assert_eq!(pending.take(), Some(signature));
                last_at = Some(at);
            }
            NetworkEvent::Airdrop { .. } => {}
        }
    }
    assert!(pending.is_none());
    assert_eq!(sends, 5);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_aborts_without_commit() {
    let h = Harness::build(
        MockNetwork::new(),
        SubmitSettings::default(),
        StagingProgram {
            max_buffer: Some(1600),
        },
    );
    let blob = vec![1u8; 2400];

    let err = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver)
        .run(&blob, 1, 800)
        .await
        .unwrap_err();

    match &err {
        ConfigPushError::Phase {
            step: PushStep::Write { index: 2 },
            source: SubmitError::ExecutionFailed { reason, .. },
        } => assert!(reason.contains("staging buffer full")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!sent_phases(&h).contains(&"commit_offchain_config"));
    assert!(staging_state(&h).active.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_from_top_resets_staging_buffer() {
    let h = Harness::new();

    let mut partial = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver);
    partial.begin(1).await.unwrap();
    partial.write(&[9u8; 100]).await.unwrap();
    h.network.fail_next_execution("interrupted");
    assert!(partial.write(&[9u8; 100]).await.is_err());
    assert_eq!(partial.phase(), PushPhase::Aborted);
    assert!(matches!(
        partial.write(&[1]).await,
        Err(ConfigPushError::OutOfOrder { .. })
    ));

    let blob = vec![5u8; 300];
    ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver)
        .run(&blob, 2, 800)
        .await
        .unwrap();

    let state = staging_state(&h);
    assert_eq!(state.active, blob);
    assert_eq!(state.active_version, 2);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_calls_send_nothing() {
    let h = Harness::new();
    let mut push = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver);

    let err = push.write(&[1, 2, 3]).await.unwrap_err();
    assert_eq!(
        err,
        ConfigPushError::OutOfOrder {
            step: PushStep::Write { index: 0 },
            phase: PushPhase::Idle,
        }
    );
    assert!(matches!(push.commit().await, Err(ConfigPushError::OutOfOrder { .. })));
    assert_eq!(h.network.sent_count(), 0);

    push.begin(1).await.unwrap();
    assert!(matches!(
        push.begin(2).await,
        Err(ConfigPushError::OutOfOrder {
            step: PushStep::Begin,
            phase: PushPhase::Begun,
        })
    ));
    assert_eq!(h.network.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_payload_is_rejected_before_begin() {
    let h = Harness::new();
    let push = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver);

    assert_eq!(push.run(&[], 1, 800).await.unwrap_err(), ConfigPushError::EmptyPayload);
    assert_eq!(h.network.sent_count(), 0);

    let push = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver);
    assert_eq!(
        push.run(&[1], 1, 0).await.unwrap_err(),
        ConfigPushError::InvalidChunkSize { chunk_size: 0 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_begin_rebuilds_on_expired_blockhash() {
    let h = Harness::new();
    h.network.serve_stale_blockhashes(1);

    let report = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver)
        .run(&[7u8; 10], 3, 800)
        .await
        .unwrap();
    assert_eq!(report.writes.len(), 1);
    assert_eq!(staging_state(&h).active_version, 3);
}

#[tokio::test(start_paused = true)]
async fn test_each_phase_runs_under_a_child_of_the_push_trace() {
    let h = Harness::new();
    let push = ConfigPush::new(&h.engine, &h.program, h.payer.pubkey(), &h.resolver);
    let correlation_id = push.correlation_id().to_string();

    let report = push.run(&[1u8; 300], 4, 200).await.unwrap();
    assert_eq!(report.correlation_id, correlation_id);

    let operations: Vec<&str> = report.phase_traces.iter().map(|t| t.operation.as_str()).collect();
    assert_eq!(operations, vec!["begin", "write[0]", "write[1]", "commit"]);

    let parent = report.phase_traces[0].parent_span_id.clone();
    assert!(parent.is_some());
    for trace in &report.phase_traces {
        assert_eq!(trace.correlation_id.as_str(), correlation_id);
        assert_eq!(trace.parent_span_id, parent);
        assert_ne!(Some(&trace.span_id), parent.as_ref());
    }
}
