//! Trend keywords summarised from a run's scores.

use serde::Serialize;

use crate::llm::{Completion, LlmClient};
use crate::types::ScoreRecord;

const TREND_SYSTEM_PROMPT: &str = "You track trends among video creators. \
Given channels with their scores and score changes, reply with a short comma-separated \
list of trending content keywords and nothing else.";

/// Scores beyond this many are left out of the prompt.
const TREND_CONTEXT_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrendResult {
    pub keywords: Vec<String>,
    #[serde(rename = "7d")]
    pub short_horizon: Vec<String>,
    #[serde(rename = "30d")]
    pub long_horizon: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrendResult {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Buckets `keywords[0..2]` and `keywords[1..3]`; the two share index 1.
    fn from_keywords(keywords: Vec<String>) -> Self {
        let short_horizon = keywords.iter().take(2).cloned().collect();
        let long_horizon = keywords.iter().skip(1).take(2).cloned().collect();
        Self {
            keywords,
            short_horizon,
            long_horizon,
            error: None,
        }
    }
}

/// Splits a completion on commas, trimming and dropping empties.
#[must_use]
pub fn parse_keywords(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn build_context(scores: &[ScoreRecord]) -> String {
    scores
        .iter()
        .take(TREND_CONTEXT_LIMIT)
        .map(|s| format!("- {} (score {}, delta {:+})", s.display_name, s.total, s.delta))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks the model for trend keywords across the first twenty scores.
///
/// Never fails: an empty run or a provider error yields a result carrying
/// `error` and empty keyword lists.
pub async fn extract_trends(llm: &dyn LlmClient, scores: &[ScoreRecord]) -> TrendResult {
    if scores.is_empty() {
        return TrendResult::failed("no scores to extract trends from".to_string());
    }

    let context = build_context(scores);
    let request = Completion {
        system: TREND_SYSTEM_PROMPT,
        user: &context,
        json: false,
    };

    match llm.complete(&request).await {
        Ok(content) => TrendResult::from_keywords(parse_keywords(&content)),
        Err(e) => {
            tracing::warn!(error = %e, "trend extraction failed");
            TrendResult::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parse_keywords_trims_and_drops_empties() {
        assert_eq!(
            parse_keywords(" VTuber, ASMR ,, Music ,"),
            vec!["VTuber", "ASMR", "Music"]
        );
        assert!(parse_keywords("  ").is_empty());
    }

    #[test]
    fn buckets_overlap_at_second_keyword() {
        let result = TrendResult::from_keywords(parse_keywords("VTuber, ASMR, Music, Dance"));
        assert_eq!(result.short_horizon, vec!["VTuber", "ASMR"]);
        assert_eq!(result.long_horizon, vec!["ASMR", "Music"]);
    }

    #[test]
    fn buckets_handle_short_lists() {
        let result = TrendResult::from_keywords(vec!["Solo".to_string()]);
        assert_eq!(result.short_horizon, vec!["Solo"]);
        assert!(result.long_horizon.is_empty());
    }

    #[test]
    fn context_is_capped_at_twenty_scores() {
        let scores: Vec<ScoreRecord> = (0..25)
            .map(|i| ScoreRecord {
                score_id: Uuid::new_v4(),
                entity_id: Uuid::new_v4(),
                display_name: format!("c{i}"),
                total: 50,
                delta: -3,
            })
            .collect();

        let context = build_context(&scores);
        assert_eq!(context.lines().count(), 20);
        assert!(context.starts_with("- c0 (score 50, delta -3)"));
    }

    #[test]
    fn serializes_with_horizon_keys() {
        let value =
            serde_json::to_value(TrendResult::from_keywords(parse_keywords("a, b, c"))).unwrap();
        assert_eq!(value["7d"], serde_json::json!(["a", "b"]));
        assert_eq!(value["30d"], serde_json::json!(["b", "c"]));
        assert!(value.get("error").is_none());
    }
}
