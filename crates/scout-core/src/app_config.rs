use std::net::SocketAddr;

use crate::AnalysisMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings, built once at startup and passed by reference into
/// every component that needs them.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_search_model: String,
    pub openai_base_url: String,
    pub youtube_api_key: Option<String>,
    pub discord_webhook_url: Option<String>,
    /// Minimum total for the `hot` tier, also shown in the report header.
    pub hot_threshold: i32,
    pub batch_size: usize,
    pub analysis_mode: AnalysisMode,
    pub min_subscribers: i64,
    pub min_upload_freq_days: f64,
    pub re_analyze_days: i64,
    pub discovery_enabled: bool,
    pub track_top: i64,
    pub track_hot: i64,
    pub track_watch: i64,
    pub track_pins: usize,
    pub default_keywords: Vec<String>,
    pub run_cron: String,
    pub notify_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("openai_api_key", &"[redacted]")
            .field("openai_model", &self.openai_model)
            .field("openai_search_model", &self.openai_search_model)
            .field("openai_base_url", &self.openai_base_url)
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "discord_webhook_url",
                &self.discord_webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("hot_threshold", &self.hot_threshold)
            .field("batch_size", &self.batch_size)
            .field("analysis_mode", &self.analysis_mode)
            .field("min_subscribers", &self.min_subscribers)
            .field("min_upload_freq_days", &self.min_upload_freq_days)
            .field("re_analyze_days", &self.re_analyze_days)
            .field("discovery_enabled", &self.discovery_enabled)
            .field("track_top", &self.track_top)
            .field("track_hot", &self.track_hot)
            .field("track_watch", &self.track_watch)
            .field("track_pins", &self.track_pins)
            .field("default_keywords", &self.default_keywords)
            .field("run_cron", &self.run_cron)
            .field("notify_timeout_secs", &self.notify_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
