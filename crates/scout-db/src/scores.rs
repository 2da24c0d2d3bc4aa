//! Database operations for `scout_scores`.

use chrono::{DateTime, Utc};
use scout_core::Tier;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::DbError;

/// A score joined with its entity's display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub entity_id: Uuid,
    pub display_name: Option<String>,
    pub demand_match: i32,
    pub improvement_potential: i32,
    pub ability_to_pay: i32,
    pub ease_of_contact: i32,
    pub style_fit: i32,
    pub total_score: i32,
    pub score_delta: i32,
    pub summary: String,
    pub fit_reasons: Json<Vec<String>>,
    pub recommended_offer: String,
    pub tier: Option<String>,
    pub gpt_model: String,
    pub created_at: DateTime<Utc>,
}

impl ScoreRow {
    /// Parses the stored tier column; `None` until the run is classified.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the column holds an unknown tier.
    pub fn tier(&self) -> Result<Option<Tier>, DbError> {
        self.tier
            .as_deref()
            .map(str::parse::<Tier>)
            .transpose()
            .map_err(DbError::from)
    }
}

/// One validated evaluation ready to persist.
#[derive(Debug, Clone)]
pub struct NewScore<'a> {
    pub run_id: Uuid,
    pub entity_id: Uuid,
    pub demand_match: i32,
    pub improvement_potential: i32,
    pub ability_to_pay: i32,
    pub ease_of_contact: i32,
    pub style_fit: i32,
    pub total_score: i32,
    pub score_delta: i32,
    pub summary: &'a str,
    pub fit_reasons: &'a [String],
    pub recommended_offer: &'a str,
    pub gpt_model: &'a str,
}

const SELECT_SCORE: &str = "SELECT sc.id, sc.run_id, sc.entity_id, e.channel_title AS display_name, \
            sc.demand_match, sc.improvement_potential, sc.ability_to_pay, \
            sc.ease_of_contact, sc.style_fit, sc.total_score, sc.score_delta, \
            sc.summary, sc.fit_reasons, sc.recommended_offer, sc.tier, sc.gpt_model, \
            sc.created_at \
     FROM scout_scores sc \
     JOIN scout_entities e ON e.id = sc.entity_id";

/// Inserts or overwrites the score for `(run_id, entity_id)` and returns its id.
///
/// Re-analysis within a run replaces the previous evaluation and clears any
/// tier assigned to it; classification runs afterwards.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_score(pool: &PgPool, score: &NewScore<'_>) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO scout_scores \
             (id, run_id, entity_id, demand_match, improvement_potential, ability_to_pay, \
              ease_of_contact, style_fit, total_score, score_delta, summary, fit_reasons, \
              recommended_offer, gpt_model) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (run_id, entity_id) DO UPDATE SET \
             demand_match          = EXCLUDED.demand_match, \
             improvement_potential = EXCLUDED.improvement_potential, \
             ability_to_pay        = EXCLUDED.ability_to_pay, \
             ease_of_contact       = EXCLUDED.ease_of_contact, \
             style_fit             = EXCLUDED.style_fit, \
             total_score           = EXCLUDED.total_score, \
             score_delta           = EXCLUDED.score_delta, \
             summary               = EXCLUDED.summary, \
             fit_reasons           = EXCLUDED.fit_reasons, \
             recommended_offer     = EXCLUDED.recommended_offer, \
             gpt_model             = EXCLUDED.gpt_model, \
             tier                  = NULL, \
             created_at            = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(score.run_id)
    .bind(score.entity_id)
    .bind(score.demand_match)
    .bind(score.improvement_potential)
    .bind(score.ability_to_pay)
    .bind(score.ease_of_contact)
    .bind(score.style_fit)
    .bind(score.total_score)
    .bind(score.score_delta)
    .bind(score.summary)
    .bind(Json(score.fit_reasons))
    .bind(score.recommended_offer)
    .bind(score.gpt_model)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Writes the tier assigned by classification onto a score row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the score does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_score_tier(pool: &PgPool, score_id: Uuid, tier: Tier) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE scout_scores SET tier = $1 WHERE id = $2")
        .bind(tier.as_str())
        .bind(score_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns all scores for a run in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scores_by_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<ScoreRow>, DbError> {
    let sql = format!("{SELECT_SCORE} WHERE sc.run_id = $1 ORDER BY sc.created_at, sc.id");
    let rows = sqlx::query_as::<_, ScoreRow>(&sql)
        .bind(run_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns the entity's most recent score, ignoring any score recorded in
/// `exclude_run`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_last_score(
    pool: &PgPool,
    entity_id: Uuid,
    exclude_run: Option<Uuid>,
) -> Result<Option<ScoreRow>, DbError> {
    let sql = format!(
        "{SELECT_SCORE} \
         WHERE sc.entity_id = $1 AND ($2::uuid IS NULL OR sc.run_id <> $2) \
         ORDER BY sc.created_at DESC, sc.id DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, ScoreRow>(&sql)
        .bind(entity_id)
        .bind(exclude_run)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns up to `limit` entity ids tagged `tier` in a run, highest score first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entity_ids_by_tier(
    pool: &PgPool,
    run_id: Uuid,
    tier: Tier,
    limit: i64,
) -> Result<Vec<Uuid>, DbError> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        "SELECT entity_id FROM scout_scores \
         WHERE run_id = $1 AND tier = $2 \
         ORDER BY total_score DESC, created_at, id \
         LIMIT $3",
    )
    .bind(run_id)
    .bind(tier.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
