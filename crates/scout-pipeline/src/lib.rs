//! Creator scout pipeline: selection, screening, LLM scoring, tiering,
//! trend extraction, and report delivery for one run at a time.

pub mod classifier;
pub mod collector;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod notifier;
pub mod orchestrator;
pub mod report;
pub mod screening;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod trends;
pub mod types;

pub use classifier::{classify_scores, classify_scores_with, Classification};
pub use collector::{Collector, YouTubeCollector};
pub use discovery::DiscoveryWorker;
pub use error::PipelineError;
pub use llm::{Completion, LlmClient, OpenAiClient};
pub use notifier::{deliver_report, DiscordNotifier, Notifier};
pub use orchestrator::{Orchestrator, RunRequest, RunSettings, RunSummary, Stage, TierCounts};
pub use report::{format_report, split_report, ReportChunk, ReportHeader, MAX_REPORT_LEN};
pub use screening::{should_analyze, ScreeningDecision, ScreeningThresholds};
pub use scoring::{build_prompt, Pacing, ScoreOutput, ScoringEngine};
pub use selector::{select_tracked_platform_ids, TrackingQuota};
pub use store::{PgStore, ScoutStore};
pub use trends::{extract_trends, TrendResult};
pub use types::{
    CollectorResult, DiscoveredChannel, PriorScore, Recommendation, ScoreRecord, SnapshotInput,
};
