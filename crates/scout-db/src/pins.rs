//! Database operations for `scout_pins`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A pin joined with its entity's platform id and display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PinRow {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub platform_id: String,
    pub display_name: Option<String>,
    pub note: Option<String>,
    pub pinned_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pins an entity, replacing the note and author if it is already pinned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including an unknown entity).
pub async fn upsert_pin(
    pool: &PgPool,
    entity_id: Uuid,
    note: Option<&str>,
    pinned_by: Option<&str>,
) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO scout_pins (id, entity_id, note, pinned_by) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (entity_id) DO UPDATE SET \
             note      = EXCLUDED.note, \
             pinned_by = EXCLUDED.pinned_by \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(entity_id)
    .bind(note)
    .bind(pinned_by)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Removes the pin for an entity.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the entity was not pinned, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_pin(pool: &PgPool, entity_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM scout_pins WHERE entity_id = $1")
        .bind(entity_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Lists all pins, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pins(pool: &PgPool) -> Result<Vec<PinRow>, DbError> {
    let rows = sqlx::query_as::<_, PinRow>(
        "SELECT p.id, p.entity_id, e.platform_id, e.channel_title AS display_name, \
                p.note, p.pinned_by, p.created_at \
         FROM scout_pins p \
         JOIN scout_entities e ON e.id = p.entity_id \
         ORDER BY p.created_at, p.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists pinned entity ids in the same order as [`list_pins`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pinned_entity_ids(pool: &PgPool) -> Result<Vec<Uuid>, DbError> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        "SELECT entity_id FROM scout_pins ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
