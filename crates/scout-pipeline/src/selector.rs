//! Picks previously seen entities to re-survey this run.

use scout_core::{AppConfig, Tier};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::store::ScoutStore;

/// How many entities to pull from each source; 30 in total by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingQuota {
    pub top: i64,
    pub hot: i64,
    pub watch: i64,
    pub pins: usize,
}

impl Default for TrackingQuota {
    fn default() -> Self {
        Self {
            top: 10,
            hot: 8,
            watch: 7,
            pins: 5,
        }
    }
}

impl TrackingQuota {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            top: config.track_top,
            hot: config.track_hot,
            watch: config.track_watch,
            pins: config.track_pins,
        }
    }
}

fn push_unique(ids: &mut Vec<Uuid>, more: impl IntoIterator<Item = Uuid>) {
    for id in more {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

/// Returns the platform ids to re-survey: the last successful run's top, hot,
/// and watch entities plus the first pins, with duplicates collapsed.
///
/// With no successful run, tier sampling is skipped. With nothing to track,
/// returns an empty list without a lookup.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if any store lookup fails.
pub async fn select_tracked_platform_ids(
    store: &dyn ScoutStore,
    quota: &TrackingQuota,
) -> Result<Vec<String>, PipelineError> {
    let mut entity_ids = Vec::new();

    if let Some(prev_run) = store.last_success_run_id().await? {
        for (tier, limit) in [
            (Tier::Top, quota.top),
            (Tier::Hot, quota.hot),
            (Tier::Watch, quota.watch),
        ] {
            let ids = store.entity_ids_by_tier(prev_run, tier, limit).await?;
            push_unique(&mut entity_ids, ids);
        }
    } else {
        tracing::info!("no successful run yet; skipping tier sampling");
    }

    let pins = store.pinned_entity_ids().await?;
    push_unique(&mut entity_ids, pins.into_iter().take(quota.pins));

    if entity_ids.is_empty() {
        return Ok(Vec::new());
    }

    let platform_ids = store.platform_ids(&entity_ids).await?;
    tracing::debug!(tracked = platform_ids.len(), "resolved tracked entities");
    Ok(platform_ids)
}
