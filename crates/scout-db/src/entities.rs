//! Database operations for `scout_entities`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `scout_entities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityRow {
    pub id: Uuid,
    pub platform: String,
    pub platform_id: String,
    pub channel_title: Option<String>,
    pub channel_description: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display attributes observed for an entity during collection.
#[derive(Debug, Clone, Copy)]
pub struct NewEntity<'a> {
    pub platform: &'a str,
    pub platform_id: &'a str,
    pub channel_title: Option<&'a str>,
    pub channel_description: Option<&'a str>,
    pub country: Option<&'a str>,
    pub language: Option<&'a str>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Inserts or refreshes an entity keyed by `(platform, platform_id)` and
/// returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_entity(pool: &PgPool, entity: &NewEntity<'_>) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO scout_entities \
             (id, platform, platform_id, channel_title, channel_description, \
              country, language, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (platform, platform_id) DO UPDATE SET \
             channel_title       = EXCLUDED.channel_title, \
             channel_description = EXCLUDED.channel_description, \
             country             = COALESCE(EXCLUDED.country, scout_entities.country), \
             language            = COALESCE(EXCLUDED.language, scout_entities.language), \
             published_at        = COALESCE(EXCLUDED.published_at, scout_entities.published_at), \
             updated_at          = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(entity.platform)
    .bind(entity.platform_id)
    .bind(entity.channel_title)
    .bind(entity.channel_description)
    .bind(entity.country)
    .bind(entity.language)
    .bind(entity.published_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Resolves entity ids to their platform-native ids in a single query.
///
/// Unknown ids are silently dropped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_platform_ids(pool: &PgPool, entity_ids: &[Uuid]) -> Result<Vec<String>, DbError> {
    if entity_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_scalar::<_, String>(
        "SELECT platform_id FROM scout_entities WHERE id = ANY($1) ORDER BY platform_id",
    )
    .bind(entity_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the id of the entity for `(platform, platform_id)`, creating a bare
/// row when none exists. Existing attributes are left untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn ensure_entity(pool: &PgPool, platform: &str, platform_id: &str) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO scout_entities (id, platform, platform_id) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (platform, platform_id) DO UPDATE SET \
             platform_id = scout_entities.platform_id \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(platform)
    .bind(platform_id)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
