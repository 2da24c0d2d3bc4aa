//! Tier assignment for a run's scores.

use std::collections::HashSet;

use scout_core::Tier;
use uuid::Uuid;

use crate::types::ScoreRecord;

pub const TOP_SIZE: usize = 10;
pub const HOT_MIN_TOTAL: i32 = 85;
pub const HOT_MIN_DELTA: i32 = 5;
pub const WATCH_MIN_TOTAL: i32 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub top: Vec<ScoreRecord>,
    pub hot: Vec<ScoreRecord>,
    pub watch: Vec<ScoreRecord>,
    pub normal: Vec<ScoreRecord>,
}

impl Classification {
    /// `(score_id, tier)` pairs in persistence order: top, hot, watch, normal.
    ///
    /// A score that is both `top` and `hot` appears twice; written in this
    /// order, `hot` is the value that sticks.
    #[must_use]
    pub fn assignments(&self) -> Vec<(Uuid, Tier)> {
        [
            (Tier::Top, &self.top),
            (Tier::Hot, &self.hot),
            (Tier::Watch, &self.watch),
            (Tier::Normal, &self.normal),
        ]
        .into_iter()
        .flat_map(|(tier, scores)| scores.iter().map(move |s| (s.score_id, tier)))
        .collect()
    }
}

/// Partitions a run's scores into tiers.
///
/// `top` is the ten highest totals (stable on ties). `hot` is every score with
/// total >= 85 and delta >= 5 and may overlap `top`. `watch` takes totals >= 60
/// outside both, and `normal` the rest. Non-top lists keep input order.
#[must_use]
pub fn classify_scores(scores: &[ScoreRecord]) -> Classification {
    classify_scores_with(scores, HOT_MIN_TOTAL)
}

/// [`classify_scores`] with the `hot` minimum total set to `hot_min_total`.
#[must_use]
pub fn classify_scores_with(scores: &[ScoreRecord], hot_min_total: i32) -> Classification {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.total.cmp(&a.total));
    sorted.truncate(TOP_SIZE);
    let top = sorted;
    let top_ids: HashSet<Uuid> = top.iter().map(|s| s.entity_id).collect();

    let hot: Vec<ScoreRecord> = scores
        .iter()
        .filter(|s| s.total >= hot_min_total && s.delta >= HOT_MIN_DELTA)
        .cloned()
        .collect();
    let hot_ids: HashSet<Uuid> = hot.iter().map(|s| s.entity_id).collect();

    let watch: Vec<ScoreRecord> = scores
        .iter()
        .filter(|s| {
            s.total >= WATCH_MIN_TOTAL
                && !top_ids.contains(&s.entity_id)
                && !hot_ids.contains(&s.entity_id)
        })
        .cloned()
        .collect();

    let assigned: HashSet<Uuid> = top_ids
        .iter()
        .chain(&hot_ids)
        .copied()
        .chain(watch.iter().map(|s| s.entity_id))
        .collect();
    let normal = scores
        .iter()
        .filter(|s| !assigned.contains(&s.entity_id))
        .cloned()
        .collect();

    Classification {
        top,
        hot,
        watch,
        normal,
    }
}
