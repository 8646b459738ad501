mod helpers;

use helpers::fixtures::{message, task_message, transcode_task};
use helpers::{setup_test_pipeline, setup_test_pipeline_with, PipelineOptions};

use vidrelay_core::constants::SUBMISSION_DECLINED;
use vidrelay_core::models::{Stage, StageStatus};
use vidrelay_core::AssetIdentity;
use vidrelay_worker::handlers::DispatchHandler;
use vidrelay_worker::{BatchHandler, QueueMessage};

fn batch(owner: &str, count: usize) -> (Vec<AssetIdentity>, Vec<QueueMessage>) {
    let identities: Vec<AssetIdentity> = (0..count)
        .map(|i| AssetIdentity::new(owner, format!("a{}", i)))
        .collect();
    let messages = identities
        .iter()
        .enumerate()
        .map(|(i, identity)| task_message(&format!("m{}", i), &transcode_task(identity)))
        .collect();
    (identities, messages)
}

#[tokio::test]
async fn full_pool_reports_everything_and_leaves_ledger_alone() {
    let pipeline = setup_test_pipeline().await;
    pipeline.pool.set_active(10);
    let (identities, messages) = batch("u1", 3);

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert_eq!(response.len(), 3);
    for m in &messages {
        assert!(response.contains(&m.message_id));
    }
    assert!(pipeline.pool.submissions().is_empty());
    for identity in &identities {
        assert!(pipeline.ledger.get(identity).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn each_sub_batch_is_admitted_and_submitted_once() {
    let pipeline = setup_test_pipeline_with(PipelineOptions {
        submit_batch_limit: 3,
        ..Default::default()
    })
    .await;
    let (identities, messages) = batch("u1", 7);

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert!(response.is_empty());
    let sizes: Vec<usize> = pipeline.pool.submissions().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(pipeline.pool.count_calls(), 3);

    for identity in &identities {
        let record = pipeline.record(identity).await;
        assert_eq!(record.current_stage, Stage::Download);
        let accepted = record.stage(Stage::Accepted).unwrap();
        assert_eq!(accepted.status, StageStatus::Completed);
        assert!(accepted.end_time.is_some());
    }
}

#[tokio::test]
async fn admission_is_advisory_within_a_sub_batch() {
    let pipeline = setup_test_pipeline().await;
    pipeline.pool.set_active(9);
    let (_, messages) = batch("u1", 5);

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert!(response.is_empty());
    assert_eq!(pipeline.pool.submitted_tasks().len(), 5);
}

#[tokio::test]
async fn declined_submission_holds_and_redelivers() {
    let pipeline = setup_test_pipeline().await;
    pipeline.pool.set_decline(true);
    let (identities, messages) = batch("u2", 2);

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert_eq!(response.len(), 2);
    for identity in &identities {
        let accepted = pipeline.record(identity).await.stage(Stage::Accepted).cloned().unwrap();
        assert_eq!(accepted.status, StageStatus::Hold);
        assert_eq!(accepted.error, SUBMISSION_DECLINED);
    }
}

#[tokio::test]
async fn unreachable_pool_holds_with_error_and_never_submits() {
    let pipeline = setup_test_pipeline().await;
    pipeline.pool.set_unreachable(true);
    let (identities, messages) = batch("u3", 2);

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert_eq!(response.len(), 2);
    assert!(pipeline.pool.submissions().is_empty());
    for identity in &identities {
        let record = pipeline.record(identity).await;
        let accepted = record.stage(Stage::Accepted).unwrap();
        assert_eq!(accepted.status, StageStatus::Hold);
        assert!(accepted.error.contains("connection refused"));
        assert!(!record.has_critical_failure);
    }
}

#[tokio::test]
async fn critical_assets_are_acknowledged_without_dispatch() {
    let pipeline = setup_test_pipeline().await;
    let (identities, messages) = batch("u4", 2);
    pipeline.ledger.mark_critical_failure(&identities[0]).await.unwrap();

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&messages)
        .await;

    assert!(response.is_empty());
    let submitted = pipeline.pool.submitted_tasks();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].asset_id, identities[1].asset_id);
    assert_eq!(
        pipeline.record(&identities[0]).await.current_stage,
        Stage::Upload
    );
}

#[tokio::test]
async fn unparseable_tasks_are_dropped() {
    let pipeline = setup_test_pipeline().await;

    let response = DispatchHandler::new(pipeline.ctx.clone())
        .handle_batch(&[message("m1", r#"{"taskType":"TRANSCODE"}"#)])
        .await;

    assert!(response.is_empty());
    assert_eq!(pipeline.pool.count_calls(), 0);
}
