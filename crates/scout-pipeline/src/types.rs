use chrono::{DateTime, Utc};
use scout_core::Tier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PipelineError;

/// A validated snapshot, ready to be screened and turned into a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInput {
    pub entity_id: Uuid,
    pub platform_id: String,
    pub display_name: String,
    pub category: Option<String>,
    pub subscribers: i64,
    pub total_views: i64,
    pub video_count: i64,
    /// Average days between uploads; `None` when too few uploads were seen.
    pub upload_freq_days: Option<f64>,
    pub recent_videos: Value,
}

impl TryFrom<&scout_db::SnapshotRow> for SnapshotInput {
    type Error = PipelineError;

    fn try_from(row: &scout_db::SnapshotRow) -> Result<Self, Self::Error> {
        let display_name = row
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PipelineError::Validation(format!("snapshot {} has no display name", row.id))
            })?
            .to_string();

        // Hidden subscriber counts read as zero and fall to the screening floor.
        let subscribers = row.subscriber_count.unwrap_or(0);
        if subscribers < 0 {
            return Err(PipelineError::Validation(format!(
                "snapshot {} has negative subscriber count {subscribers}",
                row.id
            )));
        }

        Ok(Self {
            entity_id: row.entity_id,
            platform_id: row.platform_id.clone(),
            display_name,
            category: row.category.clone(),
            subscribers,
            total_views: row.view_count.unwrap_or(0),
            video_count: row.video_count.unwrap_or(0),
            upload_freq_days: row.upload_freq_days,
            recent_videos: row.recent_videos_json.clone(),
        })
    }
}

/// The fields of an entity's previous score that screening and delta
/// computation care about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorScore {
    pub total: i32,
    pub tier: Option<Tier>,
    pub recorded_at: DateTime<Utc>,
}

impl From<&scout_db::ScoreRow> for PriorScore {
    fn from(row: &scout_db::ScoreRow) -> Self {
        let tier = row.tier().unwrap_or_else(|e| {
            tracing::warn!(score_id = %row.id, error = %e, "ignoring unreadable stored tier");
            None
        });
        Self {
            total: row.total_score,
            tier,
            recorded_at: row.created_at,
        }
    }
}

/// The slice of a stored score used for classification, trends, and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pub score_id: Uuid,
    pub entity_id: Uuid,
    pub display_name: String,
    pub total: i32,
    pub delta: i32,
}

impl From<&scout_db::ScoreRow> for ScoreRecord {
    fn from(row: &scout_db::ScoreRow) -> Self {
        Self {
            score_id: row.id,
            entity_id: row.entity_id,
            display_name: row
                .display_name
                .clone()
                .unwrap_or_else(|| row.entity_id.to_string()),
            total: row.total_score,
            delta: row.score_delta,
        }
    }
}

/// One ranked pick from an aggregated analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rank: u8,
    pub display_name: String,
    pub reason: String,
    #[serde(default)]
    pub recommended_offer: String,
}

/// A candidate channel suggested by the discovery search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredChannel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub justification: String,
}

/// Counts and per-channel errors reported by a collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectorResult {
    pub entity_count: usize,
    pub snapshot_count: usize,
    pub errors: Vec<String>,
}
