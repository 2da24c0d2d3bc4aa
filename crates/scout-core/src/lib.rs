//! Shared domain vocabulary and configuration for the creator scout.

mod app_config;
mod config;
mod domain;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{AnalysisMode, ParseEnumError, RunStatus, RunType, Tier};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
