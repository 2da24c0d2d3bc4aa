use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    LlmApi { status: u16, body: String },

    #[error("LLM returned no content")]
    EmptyCompletion,

    /// Malformed or out-of-bounds model output, or a snapshot that cannot be
    /// turned into a prompt. Scoring retries these once.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] scout_db::DbError),

    #[error("platform API error ({status}) for {context}")]
    PlatformApi { status: u16, context: String },

    #[error("notification error: {0}")]
    Notify(String),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
}

impl PipelineError {
    /// Returns `true` for unusable model output, the only kind scoring retries.
    /// An empty completion counts: it fails validation the same way as `{}`.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::EmptyCompletion)
    }
}
