use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use scout_core::RunType;
use scout_pipeline::RunRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_pipeline_error, normalize_limit, require_launcher, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StartRunBody {
    #[serde(default)]
    run_type: Option<RunType>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_notify")]
    notify: bool,
}

fn default_notify() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub(super) struct StartedRun {
    run_id: Uuid,
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    run_id: Uuid,
    run_type: String,
    status: String,
    config: Value,
    summary: Option<Value>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl From<scout_db::RunRow> for RunItem {
    fn from(row: scout_db::RunRow) -> Self {
        Self {
            run_id: row.id,
            run_type: row.run_type,
            status: row.status,
            config: row.config,
            summary: row.summary,
            started_at: row.started_at,
            finished_at: row.finished_at,
        }
    }
}

/// Trims keywords and drops blanks; an empty result falls back to `defaults`.
pub(super) fn effective_keywords(keywords: Vec<String>, defaults: &[String]) -> Vec<String> {
    let cleaned: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if cleaned.is_empty() {
        defaults.to_vec()
    } else {
        cleaned
    }
}

pub(super) async fn start_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StartRunBody>,
) -> Result<(StatusCode, Json<ApiResponse<StartedRun>>), ApiError> {
    let launcher = require_launcher(&state, &req_id.0)?;

    let request = RunRequest {
        run_type: body.run_type.unwrap_or(RunType::Manual),
        keywords: effective_keywords(body.keywords, &state.default_keywords),
        notify: body.notify,
    };

    let run_id = launcher
        .start(request)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StartedRun {
                run_id,
                status: "running",
            },
            req_id.0,
        )),
    ))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = scout_db::list_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(RunItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunItem>>, ApiError> {
    let row = scout_db::get_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(RunItem::from(row), req_id.0)))
}
