//! Database operations for `scout_snapshots`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A snapshot joined with its entity's platform id and display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub entity_id: Uuid,
    pub platform_id: String,
    pub display_name: Option<String>,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    pub upload_freq_days: Option<f64>,
    pub category: Option<String>,
    pub recent_videos_json: Value,
    pub collected_at: DateTime<Utc>,
}

/// Metrics captured for one entity during one run.
#[derive(Debug, Clone)]
pub struct NewSnapshot<'a> {
    pub run_id: Uuid,
    pub entity_id: Uuid,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    pub upload_freq_days: Option<f64>,
    pub category: Option<&'a str>,
    pub recent_videos_json: Value,
}

/// Inserts a snapshot. Snapshots are immutable: a second insert for the same
/// `(run_id, entity_id)` is ignored and returns `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_snapshot(
    pool: &PgPool,
    snapshot: &NewSnapshot<'_>,
) -> Result<Option<Uuid>, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO scout_snapshots \
             (id, run_id, entity_id, subscriber_count, view_count, video_count, \
              upload_freq_days, category, recent_videos_json) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (run_id, entity_id) DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(snapshot.run_id)
    .bind(snapshot.entity_id)
    .bind(snapshot.subscriber_count)
    .bind(snapshot.view_count)
    .bind(snapshot.video_count)
    .bind(snapshot.upload_freq_days)
    .bind(snapshot.category)
    .bind(&snapshot.recent_videos_json)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Returns every snapshot captured during a run, in collection order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_by_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<SnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT s.id, s.run_id, s.entity_id, e.platform_id, e.channel_title AS display_name, \
                s.subscriber_count, s.view_count, s.video_count, s.upload_freq_days, \
                s.category, s.recent_videos_json, s.collected_at \
         FROM scout_snapshots s \
         JOIN scout_entities e ON e.id = s.entity_id \
         WHERE s.run_id = $1 \
         ORDER BY s.collected_at, s.id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
