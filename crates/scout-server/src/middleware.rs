use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API key auth settings used by middleware. Only SHA-256 digests of the
/// configured keys are kept.
#[derive(Debug, Clone)]
pub struct AuthState {
    key_digests: Arc<Vec<Vec<u8>>>,
    pub enabled: bool,
}

fn digest(key: &str) -> Vec<u8> {
    Sha256::digest(key.as_bytes()).to_vec()
}

impl AuthState {
    /// Builds auth config from `SCOUT_API_KEYS` (comma-separated keys).
    ///
    /// In development, empty/missing keys disable auth for local iteration.
    /// In non-development envs, empty/missing keys fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("SCOUT_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Same as [`AuthState::from_env`] for an already-read key list.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut key_digests: Vec<Vec<u8>> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(digest)
            .collect();
        key_digests.dedup();

        if key_digests.is_empty() {
            if is_development {
                tracing::warn!("SCOUT_API_KEYS not set; API key auth disabled in development");
                return Ok(Self {
                    key_digests: Arc::new(Vec::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "SCOUT_API_KEYS is required outside development; provide comma-separated API keys"
            );
        }

        Ok(Self {
            key_digests: Arc::new(key_digests),
            enabled: true,
        })
    }

    /// Compares against every configured digest without short-circuiting.
    fn allows(&self, key: &str) -> bool {
        let candidate = digest(key);
        let matched = self
            .key_digests
            .iter()
            .fold(Choice::from(0), |acc, d| acc | d.as_slice().ct_eq(candidate.as_slice()));
        bool::from(matched)
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is inserted into request
/// extensions as [`RequestId`] and echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing `X-API-KEY` auth when enabled.
pub async fn require_api_key(State(auth): State<AuthState>, req: Request, next: Next) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let key = extract_api_key(req.headers().get(API_KEY_HEADER));

    match key {
        Some(key) if auth.allows(key) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid API key",
                },
            }),
        )
            .into_response(),
    }
}

fn extract_api_key(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
