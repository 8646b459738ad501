//! Process wiring: builds the shared services and one consumer per queue.

use anyhow::{Context, Result};
use std::sync::Arc;

use vidrelay_core::{QueueEndpoint, WorkerConfig};
use vidrelay_db::PgProgressLedger;
use vidrelay_infra::HttpWorkerPool;
use vidrelay_processing::ProcessInspector;
use vidrelay_storage::{create_storage, ScratchSpace};

use crate::admission::AdmissionController;
use crate::batch::BatchHandler;
use crate::consumer::{ConsumerConfig, QueueConsumer};
use crate::context::PipelineContext;
use crate::escalation::EscalationPolicy;
use crate::handlers::{
    CompletionHandler, DispatchHandler, EscalationHandler, EscalationTarget, IntakeHandler,
    ValidationHandler,
};
use crate::queue::{sqs_client, SqsQueue};

/// Connect to every external collaborator and assemble the handler context.
pub async fn build_context(config: &WorkerConfig, sqs: &aws_sdk_sqs::Client) -> Result<PipelineContext> {
    let pool = vidrelay_db::connect(config).await?;
    let ledger = Arc::new(PgProgressLedger::new(pool));

    let transport = create_storage(config, &config.transport_bucket)
        .await
        .context("Failed to initialize transport storage")?;
    let content = create_storage(config, &config.content_bucket)
        .await
        .context("Failed to initialize content storage")?;
    let scratch = ScratchSpace::new(config.scratch_dir.clone())
        .await
        .context("Failed to initialize scratch space")?;

    let worker_pool = Arc::new(HttpWorkerPool::new(&config.admission.worker_pool_url)?);
    let admission = Arc::new(AdmissionController::new(worker_pool, &config.admission));

    Ok(PipelineContext {
        ledger,
        transport,
        content,
        scratch,
        inspector: Arc::new(ProcessInspector::new(config.inspector_path.clone())),
        admission,
        validation_queue: Arc::new(SqsQueue::new(sqs.clone(), &config.queues.validation.url)),
        dispatch_queue: Arc::new(SqsQueue::new(sqs.clone(), &config.queues.dispatch.url)),
        cdn_domain: config.cdn_domain.clone(),
        completion_marker_objects: config.completion_marker_objects,
    })
}

/// One consumer per stage queue, plus one per configured dead-letter queue.
pub fn build_consumers(
    config: &WorkerConfig,
    ctx: Arc<PipelineContext>,
    sqs: &aws_sdk_sqs::Client,
) -> Vec<QueueConsumer> {
    let consumer_config = ConsumerConfig {
        batch_size: config.queues.batch_size,
        wait_time_secs: config.queues.wait_time_secs,
    };
    let policy = EscalationPolicy::from_config(&config.queues);

    let stages: [(&QueueEndpoint, Arc<dyn BatchHandler>, EscalationTarget); 4] = [
        (
            &config.queues.intake,
            Arc::new(IntakeHandler::new(ctx.clone())),
            EscalationTarget::Intake,
        ),
        (
            &config.queues.validation,
            Arc::new(ValidationHandler::new(ctx.clone())),
            EscalationTarget::Validation,
        ),
        (
            &config.queues.dispatch,
            Arc::new(DispatchHandler::new(ctx.clone())),
            EscalationTarget::Dispatch,
        ),
        (
            &config.queues.completion,
            Arc::new(CompletionHandler::new(ctx.clone())),
            EscalationTarget::Completion,
        ),
    ];

    let mut consumers = Vec::new();
    for (endpoint, handler, target) in stages {
        let escalation: Arc<dyn BatchHandler> = Arc::new(EscalationHandler::new(ctx.clone(), target));

        consumers.push(
            QueueConsumer::new(
                Arc::new(SqsQueue::new(sqs.clone(), &endpoint.url)),
                handler,
                consumer_config,
            )
            .with_escalation(policy, escalation.clone()),
        );

        if let Some(dlq_url) = &endpoint.dlq_url {
            consumers.push(QueueConsumer::new(
                Arc::new(SqsQueue::new(sqs.clone(), dlq_url)),
                escalation,
                consumer_config,
            ));
        }
    }

    consumers
}

/// Everything `main` needs to start consuming.
pub async fn initialize(config: &WorkerConfig) -> Result<Vec<QueueConsumer>> {
    let sqs = sqs_client(&config.aws_region).await;
    let ctx = Arc::new(build_context(config, &sqs).await?);
    let consumers = build_consumers(config, ctx, &sqs);

    tracing::info!(
        consumers = consumers.len(),
        environment = %config.environment,
        worker_class = %config.admission.worker_class,
        concurrency_limit = config.admission.concurrency_limit,
        "Pipeline initialized"
    );
    Ok(consumers)
}
