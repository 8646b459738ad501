use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::collections::BTreeMap;

use vidrelay_core::models::{
    initial_progress, AssetMetadata, AssetRecord, MetadataUpdate, Stage, StageField, StageRecord,
};
use vidrelay_core::AssetIdentity;

use super::ledger::{check_transition, LedgerError, ProgressLedger};
use super::transaction::TransactionGuard;

const SELECT_COLUMNS: &str = "owner_id, asset_id, created_at, updated_at, current_stage, \
     has_critical_failure, progress, metadata, expected_outputs";

/// Ledger stored in the `asset_records` table, one row per asset.
#[derive(Clone)]
pub struct PgProgressLedger {
    pool: PgPool,
}

impl PgProgressLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the initial row unless it exists. Returns whether a row was inserted.
    async fn insert_initial(
        conn: &mut PgConnection,
        identity: &AssetIdentity,
    ) -> Result<bool, LedgerError> {
        let progress = serde_json::to_value(initial_progress())?;
        let metadata = serde_json::to_value(AssetMetadata::default())?;

        let result = sqlx::query(
            r#"
            INSERT INTO asset_records (owner_id, asset_id, current_stage, progress, metadata)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id, asset_id) DO NOTHING
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .bind(Stage::Upload.as_str())
        .bind(Json(progress))
        .bind(Json(metadata))
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<AssetRecord, LedgerError> {
        let identity = AssetIdentity::new(
            row.try_get::<String, _>("owner_id")?,
            row.try_get::<String, _>("asset_id")?,
        );

        let current_stage: String = row.try_get("current_stage")?;
        let current_stage = current_stage
            .parse::<Stage>()
            .map_err(|e| LedgerError::Corrupt {
                identity: identity.clone(),
                reason: e.to_string(),
            })?;

        let Json(progress): Json<BTreeMap<Stage, StageRecord>> = row.try_get("progress")?;
        let Json(metadata): Json<AssetMetadata> = row.try_get("metadata")?;

        Ok(AssetRecord {
            identity,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            current_stage,
            has_critical_failure: row.try_get("has_critical_failure")?,
            progress,
            metadata,
            expected_output_count: row.try_get("expected_outputs")?,
        })
    }
}

#[async_trait]
impl ProgressLedger for PgProgressLedger {
    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "insert", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn initialize(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let created = Self::insert_initial(&mut *conn, identity).await?;
        if !created {
            tracing::debug!("Asset record already exists");
        }
        Ok(created)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "asset_records", db.operation = "update", owner_id = %identity.owner_id, asset_id = %identity.asset_id, from = %from, to = %to))]
    async fn record_stage_transition(
        &self,
        identity: &AssetIdentity,
        from: Stage,
        to: Stage,
        update: StageRecord,
    ) -> Result<bool, LedgerError> {
        check_transition(from, to)?;
        let update = serde_json::to_value(&update)?;

        let mut tx = TransactionGuard::begin(&self.pool).await?;
        Self::insert_initial(tx.conn()?, identity).await?;

        let result = sqlx::query(
            r#"
            UPDATE asset_records
            SET progress = jsonb_set(progress, ARRAY[$3]::text[], $4, true),
                current_stage = $5,
                updated_at = NOW()
            WHERE owner_id = $1 AND asset_id = $2
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .bind(from.as_str())
        .bind(Json(update))
        .bind(to.as_str())
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "update", owner_id = %identity.owner_id, asset_id = %identity.asset_id, stage = %stage))]
    async fn set_field(
        &self,
        identity: &AssetIdentity,
        stage: Stage,
        field: StageField,
    ) -> Result<bool, LedgerError> {
        let pending = serde_json::to_value(StageRecord::pending())?;

        let mut tx = TransactionGuard::begin(&self.pool).await?;
        Self::insert_initial(tx.conn()?, identity).await?;

        let result = sqlx::query(
            r#"
            UPDATE asset_records
            SET progress = jsonb_set(
                    progress,
                    ARRAY[$3]::text[],
                    COALESCE(progress -> $3, $4) || jsonb_build_object($5::text, $6),
                    true
                ),
                updated_at = NOW()
            WHERE owner_id = $1 AND asset_id = $2
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .bind(stage.as_str())
        .bind(Json(pending))
        .bind(field.name())
        .bind(Json(field.to_json()))
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "update", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn mark_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        Self::insert_initial(tx.conn()?, identity).await?;

        let result = sqlx::query(
            r#"
            UPDATE asset_records
            SET has_critical_failure = TRUE, updated_at = NOW()
            WHERE owner_id = $1 AND asset_id = $2
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "asset_records", db.operation = "update", owner_id = %identity.owner_id, asset_id = %identity.asset_id, path = ?update.path()))]
    async fn write_metadata(
        &self,
        identity: &AssetIdentity,
        update: MetadataUpdate,
    ) -> Result<bool, LedgerError> {
        let path: Vec<String> = update.path().iter().map(|p| p.to_string()).collect();
        let value = update.to_value()?;

        let mut tx = TransactionGuard::begin(&self.pool).await?;
        Self::insert_initial(tx.conn()?, identity).await?;

        let result = sqlx::query(
            r#"
            UPDATE asset_records
            SET metadata = jsonb_set(metadata, $3::text[], $4, true),
                updated_at = NOW()
            WHERE owner_id = $1 AND asset_id = $2
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .bind(path)
        .bind(Json(value))
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "select", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn get_created_at(&self, identity: &AssetIdentity) -> Result<DateTime<Utc>, LedgerError> {
        let created_at = sqlx::query_scalar::<Postgres, DateTime<Utc>>(
            "SELECT created_at FROM asset_records WHERE owner_id = $1 AND asset_id = $2",
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created_at.unwrap_or_else(Utc::now))
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "select", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn has_critical_failure(&self, identity: &AssetIdentity) -> Result<bool, LedgerError> {
        let flag = sqlx::query_scalar::<Postgres, bool>(
            "SELECT has_critical_failure FROM asset_records WHERE owner_id = $1 AND asset_id = $2",
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flag.unwrap_or(false))
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "select", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn get(&self, identity: &AssetIdentity) -> Result<Option<AssetRecord>, LedgerError> {
        let query = format!(
            "SELECT {} FROM asset_records WHERE owner_id = $1 AND asset_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&identity.owner_id)
            .bind(&identity.asset_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "select"))]
    async fn list_assets(&self, owner_id: &str) -> Result<Vec<AssetRecord>, LedgerError> {
        let query = format!(
            "SELECT {} FROM asset_records WHERE owner_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "update", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn record_expected_output_count(
        &self,
        identity: &AssetIdentity,
        count: i64,
    ) -> Result<bool, LedgerError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        Self::insert_initial(tx.conn()?, identity).await?;

        let result = sqlx::query(
            r#"
            UPDATE asset_records
            SET expected_outputs = $3, updated_at = NOW()
            WHERE owner_id = $1 AND asset_id = $2
            "#,
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .bind(count)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_records", db.operation = "select", owner_id = %identity.owner_id, asset_id = %identity.asset_id))]
    async fn expected_output_count(
        &self,
        identity: &AssetIdentity,
    ) -> Result<Option<i64>, LedgerError> {
        let count = sqlx::query_scalar::<Postgres, Option<i64>>(
            "SELECT expected_outputs FROM asset_records WHERE owner_id = $1 AND asset_id = $2",
        )
        .bind(&identity.owner_id)
        .bind(&identity.asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.flatten())
    }
}
