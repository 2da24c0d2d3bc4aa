//! LLM scoring: prompt rendering, output validation with one retry, score
//! deltas, and chunked batch analysis.

use std::collections::HashSet;
use std::time::Duration;

use scout_db::{NewScore, SnapshotRow};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::llm::{Completion, LlmClient};
use crate::store::ScoutStore;
use crate::types::{Recommendation, SnapshotInput};

const SYSTEM_PROMPT: &str = r#"You are a talent scout analyst evaluating overseas video creators.
Analyse the channel data you are given and reply with JSON only, no prose, in exactly this shape:

{
  "demand_match": <integer 0-30>,
  "improvement_potential": <integer 0-20>,
  "ability_to_pay": <integer 0-15>,
  "ease_of_contact": <integer 0-15>,
  "style_fit": <integer 0-20>,
  "summary": "<summary of at most 200 characters>",
  "fit_reasons": ["<reason 1>", "<reason 2>", "<reason 3>"],
  "recommended_offer": "<one-sentence recommended offer>"
}"#;

const AGGREGATED_SYSTEM_PROMPT: &str = r#"You are a talent scout analyst comparing overseas video creators.
From the channels listed, pick the three most promising and reply with JSON only, in exactly this shape:

{
  "recommendations": [
    {"rank": 1, "display_name": "<channel name as given>", "reason": "<one sentence>", "recommended_offer": "<one sentence>"}
  ]
}"#;

/// Most snapshots sent in one aggregated request.
pub const AGGREGATED_MAX_SNAPSHOTS: usize = 10;
const AGGREGATED_PICKS: usize = 3;
const SUMMARY_MAX_CHARS: usize = 200;

/// Pauses that keep scoring under external rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Wait before the single retry of an invalid completion.
    pub retry_delay: Duration,
    /// Wait between consecutive scoring chunks.
    pub batch_pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(300),
            batch_pause: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// No pauses at all.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            batch_pause: Duration::ZERO,
        }
    }
}

#[derive(Deserialize)]
struct RawScoreOutput {
    demand_match: i64,
    improvement_potential: i64,
    ability_to_pay: i64,
    ease_of_contact: i64,
    style_fit: i64,
    #[serde(default)]
    total_score: Option<i64>,
    summary: String,
    fit_reasons: Vec<String>,
    recommended_offer: String,
}

/// A validated rubric evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutput {
    pub demand_match: i32,
    pub improvement_potential: i32,
    pub ability_to_pay: i32,
    pub ease_of_contact: i32,
    pub style_fit: i32,
    pub summary: String,
    pub fit_reasons: Vec<String>,
    pub recommended_offer: String,
}

fn bounded(field: &str, value: i64, max: i64) -> Result<i32, PipelineError> {
    if !(0..=max).contains(&value) {
        return Err(PipelineError::Validation(format!(
            "{field}={value} is outside 0..={max}"
        )));
    }
    i32::try_from(value)
        .map_err(|_| PipelineError::Validation(format!("{field}={value} does not fit")))
}

impl ScoreOutput {
    /// Parses and validates a raw completion.
    ///
    /// A `total_score` supplied by the model must equal the sum of the five
    /// components; when absent the sum is used.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for malformed JSON, out-of-range
    /// components, an inconsistent total, a summary outside 1-200 characters,
    /// or an empty reasons list.
    pub fn parse(content: &str) -> Result<Self, PipelineError> {
        let raw: RawScoreOutput = serde_json::from_str(content)
            .map_err(|e| PipelineError::Validation(format!("malformed score JSON: {e}")))?;

        let output = Self {
            demand_match: bounded("demand_match", raw.demand_match, 30)?,
            improvement_potential: bounded("improvement_potential", raw.improvement_potential, 20)?,
            ability_to_pay: bounded("ability_to_pay", raw.ability_to_pay, 15)?,
            ease_of_contact: bounded("ease_of_contact", raw.ease_of_contact, 15)?,
            style_fit: bounded("style_fit", raw.style_fit, 20)?,
            summary: raw.summary.trim().to_string(),
            fit_reasons: raw
                .fit_reasons
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            recommended_offer: raw.recommended_offer.trim().to_string(),
        };

        if let Some(total) = raw.total_score {
            if total != i64::from(output.total()) {
                return Err(PipelineError::Validation(format!(
                    "total_score={total} does not equal component sum {}",
                    output.total()
                )));
            }
        }

        let summary_len = output.summary.chars().count();
        if summary_len == 0 || summary_len > SUMMARY_MAX_CHARS {
            return Err(PipelineError::Validation(format!(
                "summary length {summary_len} is outside 1..={SUMMARY_MAX_CHARS}"
            )));
        }
        if output.fit_reasons.is_empty() {
            return Err(PipelineError::Validation("fit_reasons is empty".to_string()));
        }

        Ok(output)
    }

    #[must_use]
    pub fn total(&self) -> i32 {
        self.demand_match
            + self.improvement_potential
            + self.ability_to_pay
            + self.ease_of_contact
            + self.style_fit
    }
}

/// Renders the per-entity user prompt. Identical snapshots give identical prompts.
#[must_use]
pub fn build_prompt(snapshot: &SnapshotInput) -> String {
    let upload_freq = snapshot
        .upload_freq_days
        .map_or_else(|| "unknown".to_string(), |d| format!("{d:.1} days"));
    let recent = serde_json::to_string(&snapshot.recent_videos).unwrap_or_else(|_| "[]".into());

    format!(
        "Channel: {}\n\
         Category: {}\n\
         Subscribers: {}\n\
         Total views: {}\n\
         Videos: {}\n\
         Average upload interval: {upload_freq}\n\
         Recent videos:\n\
         {recent}",
        snapshot.display_name,
        snapshot.category.as_deref().unwrap_or("unknown"),
        snapshot.subscribers,
        snapshot.total_views,
        snapshot.video_count,
    )
}

fn build_aggregated_prompt(snapshots: &[SnapshotInput]) -> String {
    let mut prompt = String::from("Channels:\n");
    for (i, snapshot) in snapshots.iter().enumerate() {
        prompt.push_str(&format!("\n#{}\n{}\n", i + 1, build_prompt(snapshot)));
    }
    prompt
}

#[derive(Deserialize)]
struct RawRecommendations {
    recommendations: Vec<Recommendation>,
}

fn parse_recommendations(
    content: &str,
    known_names: &HashSet<&str>,
) -> Result<Vec<Recommendation>, PipelineError> {
    let raw: RawRecommendations = serde_json::from_str(content)
        .map_err(|e| PipelineError::Validation(format!("malformed recommendation JSON: {e}")))?;

    if raw.recommendations.is_empty() || raw.recommendations.len() > AGGREGATED_PICKS {
        return Err(PipelineError::Validation(format!(
            "expected 1..={AGGREGATED_PICKS} recommendations, got {}",
            raw.recommendations.len()
        )));
    }

    let mut picks = raw.recommendations;
    for pick in &picks {
        if !known_names.contains(pick.display_name.as_str()) {
            return Err(PipelineError::Validation(format!(
                "recommendation names unknown channel {:?}",
                pick.display_name
            )));
        }
    }
    picks.sort_by_key(|p| p.rank);
    Ok(picks)
}

/// Scores snapshots with an LLM and persists the results.
pub struct ScoringEngine<'a> {
    llm: &'a dyn LlmClient,
    store: &'a dyn ScoutStore,
    batch_size: usize,
    pacing: Pacing,
}

impl<'a> ScoringEngine<'a> {
    #[must_use]
    pub fn new(llm: &'a dyn LlmClient, store: &'a dyn ScoutStore, batch_size: usize) -> Self {
        Self {
            llm,
            store,
            batch_size: batch_size.max(1),
            pacing: Pacing::default(),
        }
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sends one completion and validates it, retrying once after
    /// `retry_delay` when validation fails. Transport errors are not retried.
    async fn complete_validated<T>(
        &self,
        request: &Completion<'_>,
        validate: impl Fn(&str) -> Result<T, PipelineError> + Send + Sync,
    ) -> Result<T, PipelineError> {
        let first = self
            .llm
            .complete(request)
            .await
            .and_then(|content| validate(&content));

        match first {
            Err(e) if e.is_validation() => {
                tracing::warn!(error = %e, "invalid completion; retrying once");
                tokio::time::sleep(self.pacing.retry_delay).await;
                let content = self.llm.complete(request).await?;
                validate(&content)
            }
            other => other,
        }
    }

    /// Requests one rubric evaluation for a rendered prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if both attempts produce invalid
    /// output, or the provider error if a request fails.
    pub async fn score_one(&self, prompt: &str) -> Result<ScoreOutput, PipelineError> {
        let request = Completion {
            system: SYSTEM_PROMPT,
            user: prompt,
            json: true,
        };
        self.complete_validated(&request, ScoreOutput::parse).await
    }

    /// Change in total versus the entity's latest score outside `run_id`;
    /// zero when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if the lookup fails.
    pub async fn score_delta(
        &self,
        entity_id: Uuid,
        current_total: i32,
        run_id: Uuid,
    ) -> Result<i32, PipelineError> {
        let previous = self.store.last_score(entity_id, Some(run_id)).await?;
        Ok(previous.map_or(0, |p| current_total - p.total_score))
    }

    async fn analyze_one(&self, run_id: Uuid, row: &SnapshotRow) -> Result<Uuid, PipelineError> {
        let input = SnapshotInput::try_from(row)?;
        let prompt = build_prompt(&input);
        let output = self.score_one(&prompt).await?;
        let total = output.total();
        let delta = self.score_delta(input.entity_id, total, run_id).await?;

        let score_id = self
            .store
            .upsert_score(&NewScore {
                run_id,
                entity_id: input.entity_id,
                demand_match: output.demand_match,
                improvement_potential: output.improvement_potential,
                ability_to_pay: output.ability_to_pay,
                ease_of_contact: output.ease_of_contact,
                style_fit: output.style_fit,
                total_score: total,
                score_delta: delta,
                summary: &output.summary,
                fit_reasons: &output.fit_reasons,
                recommended_offer: &output.recommended_offer,
                gpt_model: self.llm.model(),
            })
            .await?;

        tracing::info!(%run_id, entity_id = %input.entity_id, total, delta, "score saved");
        Ok(score_id)
    }

    /// Scores every snapshot in chunks of `batch_size`, pausing between chunks.
    ///
    /// One entity's failure never stops the rest; each becomes an entry in the
    /// returned error list.
    pub async fn analyze_batch(&self, run_id: Uuid, snapshots: &[SnapshotRow]) -> Vec<String> {
        let mut errors = Vec::new();

        for (i, chunk) in snapshots.chunks(self.batch_size).enumerate() {
            if i > 0 && !self.pacing.batch_pause.is_zero() {
                tokio::time::sleep(self.pacing.batch_pause).await;
            }
            for row in chunk {
                if let Err(e) = self.analyze_one(run_id, row).await {
                    let msg = format!("Analyzer skipped entity_id={}: {e}", row.entity_id);
                    tracing::warn!(%run_id, entity_id = %row.entity_id, error = %e, "entity scoring failed");
                    errors.push(msg);
                }
            }
        }

        errors
    }

    /// Asks for a ranked top-3 across up to ten snapshots in one request.
    /// No score rows are written.
    ///
    /// Snapshots that cannot be rendered are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if no snapshot is usable or the
    /// model's picks stay invalid after the retry, or the provider error if a
    /// request fails.
    pub async fn analyze_aggregated(
        &self,
        snapshots: &[SnapshotRow],
    ) -> Result<Vec<Recommendation>, PipelineError> {
        let inputs: Vec<SnapshotInput> = snapshots
            .iter()
            .filter_map(|row| SnapshotInput::try_from(row).ok())
            .take(AGGREGATED_MAX_SNAPSHOTS)
            .collect();
        if inputs.is_empty() {
            return Err(PipelineError::Validation(
                "no usable snapshots for aggregated analysis".to_string(),
            ));
        }

        let known: HashSet<&str> = inputs.iter().map(|s| s.display_name.as_str()).collect();
        let prompt = build_aggregated_prompt(&inputs);
        let request = Completion {
            system: AGGREGATED_SYSTEM_PROMPT,
            user: &prompt,
            json: true,
        };
        self.complete_validated(&request, |content| parse_recommendations(content, &known))
            .await
    }
}
