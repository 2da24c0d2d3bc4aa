//! Storage seam between the pipeline and Postgres.

use async_trait::async_trait;
use scout_core::{RunStatus, RunType, Tier};
use scout_db::{DbError, NewEntity, NewScore, NewSnapshot, ScoreRow, SnapshotRow};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Reads and writes the pipeline needs. [`PgStore`] backs it with `scout-db`.
#[async_trait]
pub trait ScoutStore: Send + Sync {
    async fn create_run(&self, run_type: RunType, config: &Value) -> Result<Uuid, DbError>;

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        summary: Option<&Value>,
    ) -> Result<(), DbError>;

    async fn last_success_run_id(&self) -> Result<Option<Uuid>, DbError>;

    async fn entity_ids_by_tier(
        &self,
        run_id: Uuid,
        tier: Tier,
        limit: i64,
    ) -> Result<Vec<Uuid>, DbError>;

    async fn pinned_entity_ids(&self) -> Result<Vec<Uuid>, DbError>;

    async fn platform_ids(&self, entity_ids: &[Uuid]) -> Result<Vec<String>, DbError>;

    async fn upsert_entity(&self, entity: &NewEntity<'_>) -> Result<Uuid, DbError>;

    async fn insert_snapshot(&self, snapshot: &NewSnapshot<'_>) -> Result<Option<Uuid>, DbError>;

    async fn snapshots_by_run(&self, run_id: Uuid) -> Result<Vec<SnapshotRow>, DbError>;

    async fn last_score(
        &self,
        entity_id: Uuid,
        exclude_run: Option<Uuid>,
    ) -> Result<Option<ScoreRow>, DbError>;

    async fn upsert_score(&self, score: &NewScore<'_>) -> Result<Uuid, DbError>;

    async fn scores_by_run(&self, run_id: Uuid) -> Result<Vec<ScoreRow>, DbError>;

    async fn update_score_tier(&self, score_id: Uuid, tier: Tier) -> Result<(), DbError>;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoutStore for PgStore {
    async fn create_run(&self, run_type: RunType, config: &Value) -> Result<Uuid, DbError> {
        scout_db::insert_run(&self.pool, run_type, config).await
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        summary: Option<&Value>,
    ) -> Result<(), DbError> {
        scout_db::update_run_status(&self.pool, run_id, status, summary).await
    }

    async fn last_success_run_id(&self) -> Result<Option<Uuid>, DbError> {
        scout_db::get_last_success_run_id(&self.pool).await
    }

    async fn entity_ids_by_tier(
        &self,
        run_id: Uuid,
        tier: Tier,
        limit: i64,
    ) -> Result<Vec<Uuid>, DbError> {
        scout_db::list_entity_ids_by_tier(&self.pool, run_id, tier, limit).await
    }

    async fn pinned_entity_ids(&self) -> Result<Vec<Uuid>, DbError> {
        scout_db::list_pinned_entity_ids(&self.pool).await
    }

    async fn platform_ids(&self, entity_ids: &[Uuid]) -> Result<Vec<String>, DbError> {
        scout_db::list_platform_ids(&self.pool, entity_ids).await
    }

    async fn upsert_entity(&self, entity: &NewEntity<'_>) -> Result<Uuid, DbError> {
        scout_db::upsert_entity(&self.pool, entity).await
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot<'_>) -> Result<Option<Uuid>, DbError> {
        scout_db::insert_snapshot(&self.pool, snapshot).await
    }

    async fn snapshots_by_run(&self, run_id: Uuid) -> Result<Vec<SnapshotRow>, DbError> {
        scout_db::list_snapshots_by_run(&self.pool, run_id).await
    }

    async fn last_score(
        &self,
        entity_id: Uuid,
        exclude_run: Option<Uuid>,
    ) -> Result<Option<ScoreRow>, DbError> {
        scout_db::get_last_score(&self.pool, entity_id, exclude_run).await
    }

    async fn upsert_score(&self, score: &NewScore<'_>) -> Result<Uuid, DbError> {
        scout_db::upsert_score(&self.pool, score).await
    }

    async fn scores_by_run(&self, run_id: Uuid) -> Result<Vec<ScoreRow>, DbError> {
        scout_db::list_scores_by_run(&self.pool, run_id).await
    }

    async fn update_score_tier(&self, score_id: Uuid, tier: Tier) -> Result<(), DbError> {
        scout_db::update_score_tier(&self.pool, score_id, tier).await
    }
}
