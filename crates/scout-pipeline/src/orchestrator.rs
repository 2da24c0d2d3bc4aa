//! Runs the pipeline stages for one scout run and records the outcome.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scout_core::{AnalysisMode, AppConfig, RunStatus, RunType};
use scout_db::SnapshotRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::classifier::{classify_scores_with, Classification};
use crate::collector::{Collector, YouTubeCollector, DEFAULT_TIMEOUT_SECS};
use crate::discovery::DiscoveryWorker;
use crate::error::PipelineError;
use crate::llm::{LlmClient, OpenAiClient};
use crate::notifier::{deliver_report, DiscordNotifier, Notifier};
use crate::report::{format_report, ReportHeader};
use crate::screening::{should_analyze, ScreeningThresholds};
use crate::scoring::{Pacing, ScoringEngine, AGGREGATED_MAX_SNAPSHOTS};
use crate::selector::{select_tracked_platform_ids, TrackingQuota};
use crate::store::{PgStore, ScoutStore};
use crate::trends::{extract_trends, TrendResult};
use crate::types::{PriorScore, Recommendation, ScoreRecord, SnapshotInput};

/// What to run: trigger, search keywords, and whether to post the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_type: RunType,
    pub keywords: Vec<String>,
    pub notify: bool,
}

impl RunRequest {
    /// The request as stored in the run's `config` column.
    #[must_use]
    pub fn to_config(&self) -> Value {
        serde_json::json!({
            "run_type": self.run_type,
            "keywords": self.keywords,
            "notify": self.notify,
        })
    }
}

/// Per-run tuning, derived once from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub batch_size: usize,
    pub analysis_mode: AnalysisMode,
    pub thresholds: ScreeningThresholds,
    pub quota: TrackingQuota,
    pub hot_threshold: i32,
    pub pacing: Pacing,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            analysis_mode: AnalysisMode::Smart,
            thresholds: ScreeningThresholds::default(),
            quota: TrackingQuota::default(),
            hot_threshold: 85,
            pacing: Pacing::default(),
        }
    }
}

impl RunSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            analysis_mode: config.analysis_mode,
            thresholds: ScreeningThresholds::from_app_config(config),
            quota: TrackingQuota::from_app_config(config),
            hot_threshold: config.hot_threshold,
            pacing: Pacing::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub top: usize,
    pub hot: usize,
    pub watch: usize,
    pub normal: usize,
}

/// Accumulated outcome of a run, persisted as the run's summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub tracked: usize,
    pub scanned: usize,
    pub snapshots: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub tiers: TierCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    pub trends: Option<TrendResult>,
    pub notified_chunks: Option<usize>,
    pub fatal_error: Option<String>,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            discovered: 0,
            tracked: 0,
            scanned: 0,
            snapshots: 0,
            analyzed: 0,
            skipped: 0,
            errors: Vec::new(),
            tiers: TierCounts::default(),
            recommendations: Vec::new(),
            trends: None,
            notified_chunks: None,
            fatal_error: None,
        }
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Collection,
    Analysis,
    Classification,
    Trends,
    Notification,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Discovery,
        Stage::Collection,
        Stage::Analysis,
        Stage::Classification,
        Stage::Trends,
        Stage::Notification,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Collection => "collection",
            Stage::Analysis => "analysis",
            Stage::Classification => "classification",
            Stage::Trends => "trends",
            Stage::Notification => "notification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State threaded through every stage of one run.
struct RunContext<'r> {
    run_id: Uuid,
    request: &'r RunRequest,
    discovered_ids: Vec<String>,
    scores: Vec<ScoreRecord>,
    classification: Classification,
    trends: TrendResult,
    summary: RunSummary,
}

pub struct Orchestrator {
    store: Arc<dyn ScoutStore>,
    llm: Arc<dyn LlmClient>,
    collector: Arc<dyn Collector>,
    notifier: Option<Arc<dyn Notifier>>,
    discovery: Option<DiscoveryWorker>,
    settings: RunSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ScoutStore>,
        llm: Arc<dyn LlmClient>,
        collector: Arc<dyn Collector>,
        settings: RunSettings,
    ) -> Self {
        Self {
            store,
            llm,
            collector,
            notifier: None,
            discovery: None,
            settings,
        }
    }

    /// Wires the production collaborators: Postgres, `OpenAI`, YouTube, and the
    /// Discord webhook when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingConfig`] without a YouTube API key, or
    /// [`PipelineError::Http`] if an HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig, pool: PgPool) -> Result<Self, PipelineError> {
        let api_key = config
            .youtube_api_key
            .as_deref()
            .ok_or(PipelineError::MissingConfig("YOUTUBE_API_KEY"))?;
        let store: Arc<dyn ScoutStore> = Arc::new(PgStore::new(pool));
        let openai = OpenAiClient::new(
            &config.openai_api_key,
            &config.openai_base_url,
            &config.openai_model,
        );
        let search = config
            .discovery_enabled
            .then(|| openai.with_model(&config.openai_search_model));
        let collector = YouTubeCollector::new(api_key, Arc::clone(&store), DEFAULT_TIMEOUT_SECS)?;

        let mut orchestrator = Self::new(
            store,
            Arc::new(openai),
            Arc::new(collector),
            RunSettings::from_app_config(config),
        );
        if let Some(url) = &config.discord_webhook_url {
            let notifier = DiscordNotifier::new(url, config.notify_timeout_secs)?;
            orchestrator = orchestrator.with_notifier(Arc::new(notifier));
        }
        if let Some(search) = search {
            orchestrator = orchestrator.with_discovery(DiscoveryWorker::new(Arc::new(search)));
        }
        Ok(orchestrator)
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Enables the discovery stage.
    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryWorker) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Records a new run in `running` status and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if the run cannot be created.
    pub async fn create_run(&self, request: &RunRequest) -> Result<Uuid, PipelineError> {
        let run_id = self
            .store
            .create_run(request.run_type, &request.to_config())
            .await?;
        tracing::info!(%run_id, run_type = %request.run_type, "scout run created");
        Ok(run_id)
    }

    /// Executes every stage for an already-created run and stores the final
    /// status and summary.
    ///
    /// A stage error ends the run as `failed` with `fatal_error` set; later
    /// stages are skipped and nothing already written is rolled back.
    pub async fn run(&self, run_id: Uuid, request: &RunRequest) -> RunSummary {
        let mut ctx = RunContext {
            run_id,
            request,
            discovered_ids: Vec::new(),
            scores: Vec::new(),
            classification: Classification::default(),
            trends: TrendResult::default(),
            summary: RunSummary::new(Utc::now()),
        };

        let status = match self.execute(&mut ctx).await {
            Ok(()) => {
                tracing::info!(%run_id, "scout run completed");
                RunStatus::Success
            }
            Err((stage, e)) => {
                tracing::error!(%run_id, %stage, error = %e, "scout run failed");
                ctx.summary.fatal_error = Some(format!("{stage} stage failed: {e}"));
                RunStatus::Failed
            }
        };

        ctx.summary.finished_at = Some(Utc::now());
        self.finish_run_best_effort(run_id, status, &ctx.summary).await;
        ctx.summary
    }

    async fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), (Stage, PipelineError)> {
        for stage in Stage::ALL {
            tracing::info!(run_id = %ctx.run_id, %stage, "stage started");
            let outcome = match stage {
                Stage::Discovery => {
                    self.discover(ctx).await;
                    Ok(())
                }
                Stage::Collection => self.collect(ctx).await,
                Stage::Analysis => self.analyze(ctx).await,
                Stage::Classification => self.classify(ctx).await,
                Stage::Trends => {
                    self.attach_trends(ctx).await;
                    Ok(())
                }
                Stage::Notification => {
                    self.notify(ctx).await;
                    Ok(())
                }
            };
            outcome.map_err(|e| (stage, e))?;
        }
        Ok(())
    }

    async fn discover(&self, ctx: &mut RunContext<'_>) {
        let Some(discovery) = &self.discovery else {
            return;
        };
        let channels = discovery.discover(&ctx.request.keywords).await;
        if channels.is_empty() {
            return;
        }
        ctx.discovered_ids = self.collector.resolve_channels(&channels).await;
        ctx.summary.discovered = ctx.discovered_ids.len();
        tracing::info!(run_id = %ctx.run_id, discovered = ctx.summary.discovered, "discovery resolved channels");
    }

    async fn collect(&self, ctx: &mut RunContext<'_>) -> Result<(), PipelineError> {
        let mut platform_ids =
            select_tracked_platform_ids(self.store.as_ref(), &self.settings.quota).await?;
        ctx.summary.tracked = platform_ids.len();
        for id in ctx.discovered_ids.drain(..) {
            if !platform_ids.contains(&id) {
                platform_ids.push(id);
            }
        }

        let result = self
            .collector
            .collect(ctx.run_id, &ctx.request.keywords, &platform_ids)
            .await?;
        ctx.summary.scanned = result.entity_count;
        ctx.summary.snapshots = result.snapshot_count;
        ctx.summary.errors.extend(result.errors);
        Ok(())
    }

    /// Snapshots that pass screening. Unreadable snapshots are kept so that
    /// scoring reports why they could not be analyzed.
    async fn screen(&self, ctx: &mut RunContext<'_>, rows: Vec<SnapshotRow>) -> Vec<SnapshotRow> {
        let now = Utc::now();
        let mut survivors = Vec::with_capacity(rows.len());

        for row in rows {
            let Ok(input) = SnapshotInput::try_from(&row) else {
                survivors.push(row);
                continue;
            };
            let prior = match self.store.last_score(row.entity_id, Some(ctx.run_id)).await {
                Ok(prior) => prior.as_ref().map(PriorScore::from),
                Err(e) => {
                    ctx.summary.errors.push(format!(
                        "Screening skipped entity_id={}: {e}",
                        row.entity_id
                    ));
                    continue;
                }
            };

            let decision = should_analyze(&input, prior.as_ref(), &self.settings.thresholds, now);
            if decision.analyze {
                survivors.push(row);
            } else {
                ctx.summary.skipped += 1;
                tracing::debug!(
                    run_id = %ctx.run_id,
                    entity_id = %row.entity_id,
                    reason = decision.reason.as_deref().unwrap_or_default(),
                    "snapshot screened out"
                );
            }
        }

        survivors
    }

    async fn analyze(&self, ctx: &mut RunContext<'_>) -> Result<(), PipelineError> {
        let rows = self.store.snapshots_by_run(ctx.run_id).await?;
        let survivors = self.screen(ctx, rows).await;
        let engine = ScoringEngine::new(
            self.llm.as_ref(),
            self.store.as_ref(),
            self.settings.batch_size,
        )
        .with_pacing(self.settings.pacing);

        match self.settings.analysis_mode {
            AnalysisMode::Smart => {
                let errors = engine.analyze_batch(ctx.run_id, &survivors).await;
                ctx.summary.analyzed = survivors.len().saturating_sub(errors.len());
                ctx.summary.errors.extend(errors);
            }
            AnalysisMode::Aggregated => match engine.analyze_aggregated(&survivors).await {
                Ok(picks) => {
                    ctx.summary.analyzed = survivors.len().min(AGGREGATED_MAX_SNAPSHOTS);
                    ctx.summary.recommendations = picks;
                }
                Err(e) => {
                    tracing::warn!(run_id = %ctx.run_id, error = %e, "aggregated analysis failed");
                    ctx.summary.errors.push(format!("Aggregated analysis failed: {e}"));
                }
            },
        }

        tracing::info!(
            run_id = %ctx.run_id,
            analyzed = ctx.summary.analyzed,
            skipped = ctx.summary.skipped,
            "analysis finished"
        );
        Ok(())
    }

    async fn classify(&self, ctx: &mut RunContext<'_>) -> Result<(), PipelineError> {
        let rows = self.store.scores_by_run(ctx.run_id).await?;
        let records: Vec<ScoreRecord> = rows.iter().map(ScoreRecord::from).collect();
        let classification = classify_scores_with(&records, self.settings.hot_threshold);

        for (score_id, tier) in classification.assignments() {
            self.store.update_score_tier(score_id, tier).await?;
        }

        ctx.summary.tiers = TierCounts {
            top: classification.top.len(),
            hot: classification.hot.len(),
            watch: classification.watch.len(),
            normal: classification.normal.len(),
        };
        ctx.classification = classification;
        ctx.scores = records;
        Ok(())
    }

    async fn attach_trends(&self, ctx: &mut RunContext<'_>) {
        ctx.trends = extract_trends(self.llm.as_ref(), &ctx.scores).await;
        ctx.summary.trends = Some(ctx.trends.clone());
    }

    async fn notify(&self, ctx: &mut RunContext<'_>) {
        if !ctx.request.notify {
            return;
        }
        let Some(notifier) = &self.notifier else {
            tracing::info!(run_id = %ctx.run_id, "no notifier configured; skipping report");
            return;
        };

        let header = ReportHeader {
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            run_type: ctx.request.run_type,
            scanned: ctx.summary.scanned,
            hot_threshold: self.settings.hot_threshold,
        };
        let report = format_report(
            &header,
            &ctx.classification.top,
            &ctx.classification.hot,
            &ctx.classification.watch,
            &ctx.trends,
        );
        ctx.summary.notified_chunks = Some(deliver_report(notifier.as_ref(), &report).await);
    }

    async fn finish_run_best_effort(&self, run_id: Uuid, status: RunStatus, summary: &RunSummary) {
        let summary_json = match serde_json::to_value(summary) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(%run_id, error = %e, "failed to serialize run summary");
                None
            }
        };
        if let Err(e) = self
            .store
            .update_run_status(run_id, status, summary_json.as_ref())
            .await
        {
            tracing::error!(%run_id, %status, error = %e, "failed to record run outcome");
        }
    }
}
