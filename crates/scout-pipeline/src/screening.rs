//! Pre-analysis gate that keeps LLM calls for entities worth scoring.

use chrono::{DateTime, Utc};
use scout_core::{AppConfig, Tier};

use crate::types::{PriorScore, SnapshotInput};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningThresholds {
    pub min_subscribers: i64,
    /// Maximum average days between uploads before a channel counts as inactive.
    pub min_upload_freq_days: f64,
    pub re_analyze_days: i64,
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            min_subscribers: 500,
            min_upload_freq_days: 30.0,
            re_analyze_days: 14,
        }
    }
}

impl ScreeningThresholds {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            min_subscribers: config.min_subscribers,
            min_upload_freq_days: config.min_upload_freq_days,
            re_analyze_days: config.re_analyze_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningDecision {
    pub analyze: bool,
    pub reason: Option<String>,
}

impl ScreeningDecision {
    fn allow() -> Self {
        Self {
            analyze: true,
            reason: None,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            analyze: false,
            reason: Some(reason),
        }
    }
}

/// Decides whether a freshly collected snapshot deserves an LLM call.
///
/// Entities last tiered `top` or `hot` skip the recency check and are always
/// re-scored; only a recent `normal` score suppresses re-analysis.
#[must_use]
pub fn should_analyze(
    snapshot: &SnapshotInput,
    last: Option<&PriorScore>,
    thresholds: &ScreeningThresholds,
    now: DateTime<Utc>,
) -> ScreeningDecision {
    if snapshot.subscribers < thresholds.min_subscribers {
        return ScreeningDecision::deny(format!(
            "Low subscribers ({} < {})",
            snapshot.subscribers, thresholds.min_subscribers
        ));
    }

    if let Some(freq) = snapshot.upload_freq_days {
        if freq > thresholds.min_upload_freq_days {
            return ScreeningDecision::deny(format!(
                "Inactive ({freq:.1} days between uploads)"
            ));
        }
    }

    if let Some(prior) = last {
        let days_since = (now - prior.recorded_at).num_days();
        if days_since < thresholds.re_analyze_days && prior.tier == Some(Tier::Normal) {
            return ScreeningDecision::deny(format!(
                "Recently analyzed ({days_since} days ago)"
            ));
        }
    }

    ScreeningDecision::allow()
}
