//! In-process stand-ins for the external collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use vidrelay_core::models::{
    AssetRecord, BasicValidation, ContentMetadata, MetadataUpdate, Stage, StageField,
    StageRecord, StreamValidation, Task, TechnicalMetadata, ValidationReport,
};
use vidrelay_core::{AssetIdentity, WorkerPool, WorkerPoolError};
use vidrelay_db::{InMemoryProgressLedger, LedgerError, ProgressLedger};
use vidrelay_processing::{ContentInspector, InspectorError};

/// Worker pool with scripted occupancy that records every submission.
#[derive(Default)]
pub struct FakeWorkerPool {
    active: AtomicUsize,
    decline: AtomicBool,
    unreachable: AtomicBool,
    count_calls: AtomicUsize,
    submissions: Mutex<Vec<Vec<Task>>>,
}

impl FakeWorkerPool {
    pub fn set_active(&self, active: usize) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Vec<Task>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submitted_tasks(&self) -> Vec<Task> {
        self.submissions().into_iter().flatten().collect()
    }
}

#[async_trait]
impl WorkerPool for FakeWorkerPool {
    async fn count_active(&self, _class: &str) -> Result<usize, WorkerPoolError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(WorkerPoolError::Transport("connection refused".to_string()));
        }
        Ok(self.active.load(Ordering::SeqCst))
    }

    async fn submit(&self, tasks: &[Task]) -> Result<bool, WorkerPoolError> {
        self.submissions.lock().unwrap().push(tasks.to_vec());
        Ok(!self.decline.load(Ordering::SeqCst))
    }
}

/// Inspector that accepts everything unless told otherwise. Records the paths it saw.
#[derive(Default)]
pub struct FakeInspector {
    reject: AtomicBool,
    broken: AtomicBool,
    seen: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentInspector for FakeInspector {
    async fn validate(&self, path: &Path) -> Result<ValidationReport, InspectorError> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        if self.broken.load(Ordering::SeqCst) {
            return Err(InspectorError::Timeout(1));
        }

        let size_in_bytes = std::fs::metadata(path)?.len();
        let accepted = !self.reject.load(Ordering::SeqCst);
        Ok(ValidationReport {
            success: accepted,
            basic: BasicValidation {
                exists: true,
                size_in_bytes,
                container_format: Some("mp4".to_string()),
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
                is_valid: accepted,
                ..Default::default()
            },
            stream: StreamValidation {
                has_video_stream: true,
                has_audio_stream: true,
                is_playable: accepted,
                ..Default::default()
            },
        })
    }

    async fn extract_metadata(&self, _path: &Path) -> Result<ContentMetadata, InspectorError> {
        Ok(ContentMetadata {
            technical: TechnicalMetadata {
                container_format: Some("mp4".to_string()),
                duration: Some(12.5),
                bitrate: Some(4_000_000),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

/// In-memory ledger whose writes fail for a chosen set of assets.
#[derive(Default)]
pub struct FlakyLedger {
    inner: InMemoryProgressLedger,
    poisoned: Mutex<HashSet<String>>,
}

impl FlakyLedger {
    pub fn poison(&self, asset_id: &str) {
        self.poisoned.lock().unwrap().insert(asset_id.to_string());
    }

    pub fn inner(&self) -> &InMemoryProgressLedger {
        &self.inner
    }

    fn check(&self, identity: &AssetIdentity) -> Result<(), LedgerError> {
        if self.poisoned.lock().unwrap().contains(&identity.asset_id) {
            return Err(LedgerError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressLedger for FlakyLedger {
    async fn initialize(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        self.inner.initialize(identity).await
    }

    async fn record_stage_transition(
        &self,
        identity: &AssetIdentity,
        from: Stage,
        to: Stage,
        update: StageRecord,
    ) -> Result<bool, LedgerError> {
        self.check(identity)?;
        self.inner.record_stage_transition(identity, from, to, update).await
    }

    async fn set_field(
        &self,
        identity: &AssetIdentity,
        stage: Stage,
        field: StageField,
    ) -> Result<bool, LedgerError> {
        self.check(identity)?;
        self.inner.set_field(identity, stage, field).await
    }

    async fn mark_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        self.check(identity)?;
        self.inner.mark_critical_failure(identity).await
    }

    async fn write_metadata(
        &self,
        identity: &AssetIdentity,
        update: MetadataUpdate,
    ) -> Result<bool, LedgerError> {
        self.check(identity)?;
        self.inner.write_metadata(identity, update).await
    }

    async fn get_created_at(&self, identity: &AssetIdentity) -> Result<DateTime<Utc>, LedgerError> {
        self.inner.get_created_at(identity).await
    }

    async fn has_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        self.inner.has_critical_failure(identity).await
    }

    async fn get(&self, identity: &AssetIdentity) -> Result<Option<AssetRecord>, LedgerError> {
        self.inner.get(identity).await
    }

    async fn list_assets(&self, owner_id: &str) -> Result<Vec<AssetRecord>, LedgerError> {
        self.inner.list_assets(owner_id).await
    }

    async fn record_expected_output_count(
        &self,
        identity: &AssetIdentity,
        count: i64,
    ) -> Result<bool, LedgerError> {
        self.check(identity)?;
        self.inner.record_expected_output_count(identity, count).await
    }

    async fn expected_output_count(
        &self,
        identity: &AssetIdentity,
    ) -> Result<Option<i64>, LedgerError> {
        self.inner.expected_output_count(identity).await
    }
}
