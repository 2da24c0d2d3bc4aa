//! Database operations for `scout_runs`.

use chrono::{DateTime, Utc};
use scout_core::{RunStatus, RunType};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `scout_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub run_type: String,
    pub status: String,
    pub config: Value,
    pub summary: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRow {
    /// Parses the stored status column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the column holds an unknown status.
    pub fn status(&self) -> Result<RunStatus, DbError> {
        Ok(self.status.parse()?)
    }
}

/// Creates a new run in `running` status and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_run(pool: &PgPool, run_type: RunType, config: &Value) -> Result<Uuid, DbError> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO scout_runs (id, run_type, status, config) \
         VALUES ($1, $2, 'running', $3)",
    )
    .bind(id)
    .bind(run_type.as_str())
    .bind(config)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Sets a run's status and, when given, its summary.
///
/// Terminal statuses also stamp `finished_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has the given id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_run_status(
    pool: &PgPool,
    id: Uuid,
    status: RunStatus,
    summary: Option<&Value>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scout_runs \
         SET status = $1, \
             summary = COALESCE($2, summary), \
             finished_at = CASE WHEN $1 = 'running' THEN finished_at ELSE NOW() END \
         WHERE id = $3",
    )
    .bind(status.as_str())
    .bind(summary)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<RunRow, DbError> {
    sqlx::query_as::<_, RunRow>(
        "SELECT id, run_type, status, config, summary, started_at, finished_at \
         FROM scout_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_runs(pool: &PgPool, limit: i64) -> Result<Vec<RunRow>, DbError> {
    let rows = sqlx::query_as::<_, RunRow>(
        "SELECT id, run_type, status, config, summary, started_at, finished_at \
         FROM scout_runs \
         ORDER BY started_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the id of the most recently finished successful run, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_last_success_run_id(pool: &PgPool) -> Result<Option<Uuid>, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM scout_runs \
         WHERE status = 'success' \
         ORDER BY finished_at DESC NULLS LAST, started_at DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(id)
}
