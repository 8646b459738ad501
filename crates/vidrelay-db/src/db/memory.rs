use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use vidrelay_core::models::{AssetRecord, MetadataUpdate, Stage, StageField, StageRecord};
use vidrelay_core::AssetIdentity;

use super::ledger::{check_transition, LedgerError, ProgressLedger};

/// Ledger held in process memory.
#[derive(Default)]
pub struct InMemoryProgressLedger {
    records: RwLock<HashMap<AssetIdentity, AssetRecord>>,
}

impl InMemoryProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Apply `f` to the record, creating it first if needed.
    async fn upsert<F>(&self, identity: &AssetIdentity, f: F)
    where
        F: FnOnce(&mut AssetRecord),
    {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let record = records
            .entry(identity.clone())
            .or_insert_with(|| AssetRecord::new(identity.clone(), now));
        f(record);
        record.updated_at = now;
    }
}

#[async_trait]
impl ProgressLedger for InMemoryProgressLedger {
    async fn initialize(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        let mut records = self.records.write().await;
        if records.contains_key(identity) {
            return Ok(false);
        }
        records.insert(
            identity.clone(),
            AssetRecord::new(identity.clone(), Utc::now()),
        );
        Ok(true)
    }

    async fn record_stage_transition(
        &self,
        identity: &AssetIdentity,
        from: Stage,
        to: Stage,
        update: StageRecord,
    ) -> Result<bool, LedgerError> {
        check_transition(from, to)?;
        self.upsert(identity, |record| {
            record.progress.insert(from, update);
            record.current_stage = to;
        })
        .await;
        Ok(true)
    }

    async fn set_field(
        &self,
        identity: &AssetIdentity,
        stage: Stage,
        field: StageField,
    ) -> Result<bool, LedgerError> {
        self.upsert(identity, |record| {
            field.apply(record.progress.entry(stage).or_default());
        })
        .await;
        Ok(true)
    }

    async fn mark_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        self.upsert(identity, |record| record.has_critical_failure = true)
            .await;
        Ok(true)
    }

    async fn write_metadata(
        &self,
        identity: &AssetIdentity,
        update: MetadataUpdate,
    ) -> Result<bool, LedgerError> {
        self.upsert(identity, |record| update.apply(&mut record.metadata))
            .await;
        Ok(true)
    }

    async fn get_created_at(&self, identity: &AssetIdentity) -> Result<DateTime<Utc>, LedgerError> {
        Ok(self
            .records
            .read()
            .await
            .get(identity)
            .map(|r| r.created_at)
            .unwrap_or_else(Utc::now))
    }

    async fn has_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        Ok(self
            .records
            .read()
            .await
            .get(identity)
            .map(|r| r.has_critical_failure)
            .unwrap_or(false))
    }

    async fn get(&self, identity: &AssetIdentity) -> Result<Option<AssetRecord>, LedgerError> {
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn list_assets(&self, owner_id: &str) -> Result<Vec<AssetRecord>, LedgerError> {
        let mut assets: Vec<AssetRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.identity.owner_id == owner_id)
            .cloned()
            .collect();
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(assets)
    }

    async fn record_expected_output_count(
        &self,
        identity: &AssetIdentity,
        count: i64,
    ) -> Result<bool, LedgerError> {
        self.upsert(identity, |record| record.expected_output_count = Some(count))
            .await;
        Ok(true)
    }

    async fn expected_output_count(
        &self,
        identity: &AssetIdentity,
    ) -> Result<Option<i64>, LedgerError> {
        Ok(self
            .records
            .read()
            .await
            .get(identity)
            .and_then(|r| r.expected_output_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidrelay_core::constants::NO_ERROR;
    use vidrelay_core::models::{BasicValidation, StageStatus};

    fn id() -> AssetIdentity {
        AssetIdentity::new("u1", "a1")
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let ledger = InMemoryProgressLedger::new();
        assert!(ledger.initialize(&id()).await.unwrap());
        assert!(!ledger.initialize(&id()).await.unwrap());
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn transition_writes_from_stage_and_moves_pointer() {
        let ledger = InMemoryProgressLedger::new();
        ledger.initialize(&id()).await.unwrap();
        let start = ledger.get_created_at(&id()).await.unwrap();

        ledger
            .record_stage_transition(
                &id(),
                Stage::Upload,
                Stage::Validation,
                StageRecord::completed(start),
            )
            .await
            .unwrap();

        let record = ledger.get(&id()).await.unwrap().unwrap();
        let upload = record.stage(Stage::Upload).unwrap();
        assert_eq!(upload.status, StageStatus::Completed);
        assert_eq!(upload.start_time, Some(start));
        assert!(upload.end_time.is_some());
        assert_eq!(upload.error, NO_ERROR);
        assert_eq!(record.current_stage, Stage::Validation);
        assert_eq!(
            record.stage(Stage::Validation).unwrap().status,
            StageStatus::Pending
        );
    }

    #[tokio::test]
    async fn out_of_table_transition_is_rejected_without_write() {
        let ledger = InMemoryProgressLedger::new();
        ledger.initialize(&id()).await.unwrap();

        let err = ledger
            .record_stage_transition(
                &id(),
                Stage::Upload,
                Stage::Finished,
                StageRecord::completed(Utc::now()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        let record = ledger.get(&id()).await.unwrap().unwrap();
        assert_eq!(record.current_stage, Stage::Upload);
        assert_eq!(
            record.stage(Stage::Upload).unwrap().status,
            StageStatus::Pending
        );
    }

    #[tokio::test]
    async fn writes_create_missing_record() {
        let ledger = InMemoryProgressLedger::new();
        ledger
            .set_field(&id(), Stage::Accepted, StageField::Status(StageStatus::Failed))
            .await
            .unwrap();
        ledger.mark_critical_failure(&id()).await.unwrap();

        let record = ledger.get(&id()).await.unwrap().unwrap();
        assert!(record.has_critical_failure);
        assert_eq!(
            record.stage(Stage::Accepted).unwrap().status,
            StageStatus::Failed
        );
    }

    #[tokio::test]
    async fn critical_flag_survives_later_writes() {
        let ledger = InMemoryProgressLedger::new();
        ledger.initialize(&id()).await.unwrap();
        ledger.mark_critical_failure(&id()).await.unwrap();

        ledger
            .record_stage_transition(
                &id(),
                Stage::Upload,
                Stage::Validation,
                StageRecord::completed(Utc::now()),
            )
            .await
            .unwrap();
        ledger
            .write_metadata(&id(), MetadataUpdate::Basic(BasicValidation::default()))
            .await
            .unwrap();
        assert!(!ledger.initialize(&id()).await.unwrap());

        assert!(ledger.has_critical_failure(&id()).await.unwrap());
    }

    #[tokio::test]
    async fn created_at_falls_back_to_now() {
        let ledger = InMemoryProgressLedger::new();
        let before = Utc::now();
        let created = ledger.get_created_at(&id()).await.unwrap();
        assert!(created >= before);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn list_assets_filters_by_owner() {
        let ledger = InMemoryProgressLedger::new();
        ledger.initialize(&id()).await.unwrap();
        ledger
            .initialize(&AssetIdentity::new("u1", "a2"))
            .await
            .unwrap();
        ledger
            .initialize(&AssetIdentity::new("u2", "a1"))
            .await
            .unwrap();

        let assets = ledger.list_assets("u1").await.unwrap();
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.identity.owner_id == "u1"));
    }

    #[tokio::test]
    async fn expected_output_count_round_trips() {
        let ledger = InMemoryProgressLedger::new();
        assert_eq!(ledger.expected_output_count(&id()).await.unwrap(), None);
        ledger.record_expected_output_count(&id(), 5).await.unwrap();
        assert_eq!(ledger.expected_output_count(&id()).await.unwrap(), Some(5));
    }
}
