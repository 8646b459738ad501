#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

use std::sync::Arc;
use tempfile::TempDir;

use vidrelay_core::models::{AssetRecord, Task};
use vidrelay_core::AssetIdentity;
use vidrelay_db::{InMemoryProgressLedger, ProgressLedger};
use vidrelay_storage::{LocalStorage, ScratchSpace, Storage};
use vidrelay_worker::{
    AdmissionController, InMemoryQueue, MessageSource, PipelineContext, QueueMessage,
};

use fakes::{FakeInspector, FakeWorkerPool};

pub const CDN_DOMAIN: &str = "cdn.example.com";

/// Knobs for [`setup_test_pipeline_with`].
pub struct PipelineOptions {
    pub concurrency_limit: usize,
    pub submit_batch_limit: usize,
    pub completion_marker_objects: u64,
    /// Replaces the in-memory ledger, e.g. with a failure-injecting one.
    pub ledger: Option<Arc<dyn ProgressLedger>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 10,
            submit_batch_limit: 5,
            completion_marker_objects: 1,
            ledger: None,
        }
    }
}

/// A pipeline wired to in-process collaborators.
pub struct TestPipeline {
    pub ctx: Arc<PipelineContext>,
    pub ledger: Arc<dyn ProgressLedger>,
    pub pool: Arc<FakeWorkerPool>,
    pub inspector: Arc<FakeInspector>,
    pub validation_queue: Arc<InMemoryQueue>,
    pub dispatch_queue: Arc<InMemoryQueue>,
    pub transport: Arc<LocalStorage>,
    pub content: Arc<LocalStorage>,
    pub scratch: ScratchSpace,
    pub _temp_dir: TempDir,
}

impl TestPipeline {
    pub async fn record(&self, identity: &AssetIdentity) -> AssetRecord {
        self.ledger
            .get(identity)
            .await
            .expect("ledger read")
            .expect("asset record exists")
    }

    /// Drain every visible message of `queue`.
    pub async fn drain(queue: &InMemoryQueue) -> Vec<QueueMessage> {
        let mut drained = Vec::new();
        loop {
            let batch = queue.receive(10, 0).await.expect("in-memory receive");
            if batch.is_empty() {
                return drained;
            }
            drained.extend(batch);
        }
    }

    pub async fn enqueued_tasks(queue: &InMemoryQueue) -> Vec<Task> {
        queue
            .visible_bodies()
            .await
            .iter()
            .map(|body| serde_json::from_str(body).expect("queued task parses"))
            .collect()
    }

    /// Store an upload in the transport bucket.
    pub async fn upload(&self, key: &str) {
        self.transport
            .put(key, fixtures::sample_video())
            .await
            .expect("upload stored");
    }

    /// Simulate the transcoder: `outputs` objects plus the completion marker.
    pub async fn write_outputs(&self, identity: &AssetIdentity, outputs: usize) -> String {
        for i in 0..outputs {
            let key = format!("{}/mp4/output-{}.mp4", identity.prefix(), i);
            self.content
                .put(&key, bytes::Bytes::from_static(b"segment"))
                .await
                .expect("output stored");
        }
        let marker = format!("{}/completion.json", identity.prefix());
        self.content
            .put(&marker, bytes::Bytes::from(format!("{{\"fileCount\":{}}}", outputs)))
            .await
            .expect("marker stored");
        marker
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.dir())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

pub async fn setup_test_pipeline() -> TestPipeline {
    setup_test_pipeline_with(PipelineOptions::default()).await
}

pub async fn setup_test_pipeline_with(options: PipelineOptions) -> TestPipeline {
    let temp_dir = TempDir::new().expect("temp dir");

    let transport = Arc::new(
        LocalStorage::new(temp_dir.path().join(fixtures::TRANSPORT_BUCKET))
            .await
            .expect("transport storage"),
    );
    let content = Arc::new(
        LocalStorage::new(temp_dir.path().join(fixtures::CONTENT_BUCKET))
            .await
            .expect("content storage"),
    );
    let scratch = ScratchSpace::new(temp_dir.path().join("scratch"))
        .await
        .expect("scratch space");

    let ledger: Arc<dyn ProgressLedger> = options
        .ledger
        .unwrap_or_else(|| Arc::new(InMemoryProgressLedger::new()));
    let pool = Arc::new(FakeWorkerPool::default());
    let inspector = Arc::new(FakeInspector::default());
    let validation_queue = Arc::new(InMemoryQueue::new("validation"));
    let dispatch_queue = Arc::new(InMemoryQueue::new("dispatch"));

    let admission = Arc::new(AdmissionController::with_limits(
        pool.clone(),
        "processor",
        options.concurrency_limit,
        options.submit_batch_limit,
    ));

    let ctx = Arc::new(PipelineContext {
        ledger: ledger.clone(),
        transport: transport.clone(),
        content: content.clone(),
        scratch: scratch.clone(),
        inspector: inspector.clone(),
        admission,
        validation_queue: validation_queue.clone(),
        dispatch_queue: dispatch_queue.clone(),
        cdn_domain: CDN_DOMAIN.to_string(),
        completion_marker_objects: options.completion_marker_objects,
    });

    TestPipeline {
        ctx,
        ledger,
        pool,
        inspector,
        validation_queue,
        dispatch_queue,
        transport,
        content,
        scratch,
        _temp_dir: temp_dir,
    }
}
