use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use scout_pipeline::collector::PLATFORM;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AddPinBody {
    platform_id: String,
    note: Option<String>,
    pinned_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PinItem {
    entity_id: Uuid,
    platform_id: String,
    display_name: Option<String>,
    note: Option<String>,
    pinned_by: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct AddedPin {
    pin_id: Uuid,
    entity_id: Uuid,
    platform_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RemovedPin {
    entity_id: Uuid,
}

pub(super) async fn add_pin(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AddPinBody>,
) -> Result<(StatusCode, Json<ApiResponse<AddedPin>>), ApiError> {
    let platform_id = body.platform_id.trim();
    if platform_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "platform_id must not be empty",
        ));
    }

    let entity_id = scout_db::ensure_entity(&state.pool, PLATFORM, platform_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let pin_id = scout_db::upsert_pin(
        &state.pool,
        entity_id,
        body.note.as_deref(),
        body.pinned_by.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(%entity_id, platform_id, "pin added");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            AddedPin {
                pin_id,
                entity_id,
                platform_id: platform_id.to_string(),
            },
            req_id.0,
        )),
    ))
}

pub(super) async fn list_pins(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PinItem>>>, ApiError> {
    let rows = scout_db::list_pins(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PinItem {
            entity_id: row.entity_id,
            platform_id: row.platform_id,
            display_name: row.display_name,
            note: row.note,
            pinned_by: row.pinned_by,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn remove_pin(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(entity_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RemovedPin>>, ApiError> {
    scout_db::delete_pin(&state.pool, entity_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(%entity_id, "pin removed");
    Ok(Json(ApiResponse::new(RemovedPin { entity_id }, req_id.0)))
}
