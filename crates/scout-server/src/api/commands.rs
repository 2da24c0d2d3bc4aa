//! Chat-style slash commands, e.g. `/scout run VTuber ASMR`.

use axum::{extract::State, http::StatusCode, Extension, Json};
use scout_core::RunType;
use scout_pipeline::RunRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_pipeline_error, require_launcher, runs::effective_keywords, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct CommandBody {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ScoutCommand {
    Run { keywords: Vec<String> },
}

#[derive(Debug, Serialize)]
pub(super) struct CommandReply {
    run_id: Uuid,
    keywords: Vec<String>,
    message: String,
}

/// Parses `/scout <subcommand> [args…]`.
pub(super) fn parse_command(text: &str) -> Result<ScoutCommand, String> {
    let mut parts = text.split_whitespace();
    if parts.next() != Some("/scout") {
        return Err("commands must start with /scout".to_string());
    }
    match parts.next() {
        Some("run") => Ok(ScoutCommand::Run {
            keywords: parts.map(ToString::to_string).collect(),
        }),
        Some(other) => Err(format!("unknown subcommand: {other}")),
        None => Err("usage: /scout run [keywords...]".to_string()),
    }
}

pub(super) async fn handle_command(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CommandBody>,
) -> Result<(StatusCode, Json<ApiResponse<CommandReply>>), ApiError> {
    let command = parse_command(&body.text)
        .map_err(|msg| ApiError::new(req_id.0.clone(), "bad_request", msg))?;

    match command {
        ScoutCommand::Run { keywords } => {
            let launcher = require_launcher(&state, &req_id.0)?;
            let keywords = effective_keywords(keywords, &state.default_keywords);
            let request = RunRequest {
                run_type: RunType::Manual,
                keywords: keywords.clone(),
                notify: true,
            };
            let run_id = launcher
                .start(request)
                .await
                .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

            let message = format!("Scout run started for: {}", keywords.join(", "));
            Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::new(
                    CommandReply {
                        run_id,
                        keywords,
                        message,
                    },
                    req_id.0,
                )),
            ))
        }
    }
}
