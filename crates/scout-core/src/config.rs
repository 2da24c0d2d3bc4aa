use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::{AnalysisMode, ConfigError};

const DEFAULT_KEYWORDS: &str = "VTuber,Cover,Singer";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Kept separate from the process environment so it can be tested with a
/// plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> { lookup(var).ok().filter(|v| !v.is_empty()) };

    let database_url = require("DATABASE_URL")?;
    let openai_api_key = require("OPENAI_API_KEY")?;

    let env = parse_environment(&or_default("SCOUT_ENV", "development"))?;
    let bind_addr = parse_var(&lookup, "SCOUT_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("SCOUT_LOG_LEVEL", "info");

    let openai_model = or_default("OPENAI_MODEL", "gpt-4o-mini");
    let openai_search_model = or_default("OPENAI_SEARCH_MODEL", "gpt-4o-search-preview");
    let openai_base_url = or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
    let youtube_api_key = optional("YOUTUBE_API_KEY");
    let discord_webhook_url = optional("DISCORD_WEBHOOK_URL");

    let hot_threshold = parse_var(&lookup, "HOT_THRESHOLD", "85")?;
    let batch_size: usize = parse_var(&lookup, "BATCH_SIZE", "5")?;
    if batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let analysis_mode = parse_analysis_mode(&or_default("ANALYSIS_MODE", "smart"))?;
    let min_subscribers = parse_var(&lookup, "MIN_SUBSCRIBERS", "500")?;
    let min_upload_freq_days = parse_var(&lookup, "MIN_UPLOAD_FREQ_DAYS", "30")?;
    let re_analyze_days = parse_var(&lookup, "RE_ANALYZE_DAYS", "14")?;
    let discovery_enabled = parse_var(&lookup, "DISCOVERY_ENABLED", "false")?;

    let track_top = parse_var(&lookup, "SCOUT_TRACK_TOP", "10")?;
    let track_hot = parse_var(&lookup, "SCOUT_TRACK_HOT", "8")?;
    let track_watch = parse_var(&lookup, "SCOUT_TRACK_WATCH", "7")?;
    let track_pins = parse_var(&lookup, "SCOUT_TRACK_PINS", "5")?;

    let default_keywords = split_keywords(&or_default("SCOUT_DEFAULT_KEYWORDS", DEFAULT_KEYWORDS));
    let run_cron = or_default("SCOUT_RUN_CRON", "0 0 0 * * *");
    let notify_timeout_secs = parse_var(&lookup, "SCOUT_NOTIFY_TIMEOUT_SECS", "10")?;

    let db_max_connections = parse_var(&lookup, "SCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_var(&lookup, "SCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&lookup, "SCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        openai_api_key,
        openai_model,
        openai_search_model,
        openai_base_url,
        youtube_api_key,
        discord_webhook_url,
        hot_threshold,
        batch_size,
        analysis_mode,
        min_subscribers,
        min_upload_freq_days,
        re_analyze_days,
        discovery_enabled,
        track_top,
        track_hot,
        track_watch,
        track_pins,
        default_keywords,
        run_cron,
        notify_timeout_secs,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SCOUT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_analysis_mode(s: &str) -> Result<AnalysisMode, ConfigError> {
    s.parse::<AnalysisMode>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "ANALYSIS_MODE".to_string(),
            reason: e.to_string(),
        })
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
