//! In-memory collaborators shared by the pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scout_core::{RunStatus, RunType, Tier};
use scout_db::{
    DbError, EntityRow, NewEntity, NewScore, NewSnapshot, RunRow, ScoreRow, SnapshotRow,
};
use scout_pipeline::{
    Collector, CollectorResult, Completion, DiscoveredChannel, LlmClient, Notifier, PipelineError,
    ScoutStore,
};
use serde_json::{json, Value};
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    runs: Vec<RunRow>,
    entities: Vec<EntityRow>,
    snapshots: Vec<SnapshotRow>,
    scores: Vec<ScoreRow>,
    pins: Vec<Uuid>,
}

/// Mirrors the ordering and upsert rules of the Postgres queries.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub platform_lookups: AtomicUsize,
    pub fail_tier_updates: bool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_tier_updates() -> Arc<Self> {
        Arc::new(Self {
            fail_tier_updates: true,
            ..Self::default()
        })
    }

    pub fn seed_run(&self, status: RunStatus, finished_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().runs.push(RunRow {
            id,
            run_type: RunType::Scheduled.as_str().to_string(),
            status: status.as_str().to_string(),
            config: json!({}),
            summary: None,
            started_at: finished_at - Duration::minutes(5),
            finished_at: Some(finished_at),
        });
        id
    }

    pub fn seed_entity(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.tables.lock().unwrap().entities.push(EntityRow {
            id,
            platform: "youtube".to_string(),
            platform_id: format!("UC-{name}"),
            channel_title: Some(name.to_string()),
            channel_description: None,
            country: None,
            language: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn seed_score(
        &self,
        run_id: Uuid,
        entity_id: Uuid,
        total: i32,
        tier: Option<Tier>,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let mut tables = self.tables.lock().unwrap();
        let display_name = entity_name(&tables, entity_id);
        tables.scores.push(ScoreRow {
            id,
            run_id,
            entity_id,
            display_name,
            demand_match: 0,
            improvement_potential: 0,
            ability_to_pay: 0,
            ease_of_contact: 0,
            style_fit: 0,
            total_score: total,
            score_delta: 0,
            summary: "seeded".to_string(),
            fit_reasons: Json(vec!["seeded".to_string()]),
            recommended_offer: "none".to_string(),
            tier: tier.map(|t| t.as_str().to_string()),
            gpt_model: "seed".to_string(),
            created_at,
        });
        id
    }

    /// Snapshot row for an already seeded entity, stored under `run_id`.
    pub fn seed_snapshot(&self, run_id: Uuid, entity_id: Uuid, subscribers: Option<i64>) -> SnapshotRow {
        let mut tables = self.tables.lock().unwrap();
        let entity = tables
            .entities
            .iter()
            .find(|e| e.id == entity_id)
            .cloned()
            .expect("entity seeded");
        let row = SnapshotRow {
            id: Uuid::new_v4(),
            run_id,
            entity_id,
            platform_id: entity.platform_id,
            display_name: entity.channel_title,
            subscriber_count: subscribers,
            view_count: Some(100_000),
            video_count: Some(40),
            upload_freq_days: Some(4.0),
            category: Some("Music".to_string()),
            recent_videos_json: json!([]),
            collected_at: Utc::now(),
        };
        tables.snapshots.push(row.clone());
        row
    }

    pub fn pin(&self, entity_id: Uuid) {
        self.tables.lock().unwrap().pins.push(entity_id);
    }

    pub fn run(&self, run_id: Uuid) -> RunRow {
        self.tables
            .lock()
            .unwrap()
            .runs
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
            .expect("run exists")
    }

    pub fn scores_for(&self, run_id: Uuid) -> Vec<ScoreRow> {
        self.tables
            .lock()
            .unwrap()
            .scores
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect()
    }

    pub fn snapshot_count(&self) -> usize {
        self.tables.lock().unwrap().snapshots.len()
    }

    pub fn entity_by_platform_id(&self, platform_id: &str) -> Option<EntityRow> {
        self.tables
            .lock()
            .unwrap()
            .entities
            .iter()
            .find(|e| e.platform_id == platform_id)
            .cloned()
    }

    pub fn snapshot_for(&self, entity_id: Uuid) -> Option<SnapshotRow> {
        self.tables
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .find(|s| s.entity_id == entity_id)
            .cloned()
    }
}

fn entity_name(tables: &Tables, entity_id: Uuid) -> Option<String> {
    tables
        .entities
        .iter()
        .find(|e| e.id == entity_id)
        .and_then(|e| e.channel_title.clone())
}

#[async_trait]
impl ScoutStore for MemoryStore {
    async fn create_run(&self, run_type: RunType, config: &Value) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().runs.push(RunRow {
            id,
            run_type: run_type.as_str().to_string(),
            status: RunStatus::Running.as_str().to_string(),
            config: config.clone(),
            summary: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        Ok(id)
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        summary: Option<&Value>,
    ) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let run = tables
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(DbError::NotFound)?;
        run.status = status.as_str().to_string();
        if let Some(summary) = summary {
            run.summary = Some(summary.clone());
        }
        if status != RunStatus::Running {
            run.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn last_success_run_id(&self) -> Result<Option<Uuid>, DbError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .runs
            .iter()
            .filter(|r| r.status == "success")
            .max_by_key(|r| r.finished_at)
            .map(|r| r.id))
    }

    async fn entity_ids_by_tier(
        &self,
        run_id: Uuid,
        tier: Tier,
        limit: i64,
    ) -> Result<Vec<Uuid>, DbError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<&ScoreRow> = tables
            .scores
            .iter()
            .filter(|s| s.run_id == run_id && s.tier.as_deref() == Some(tier.as_str()))
            .collect();
        rows.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|s| s.entity_id)
            .collect())
    }

    async fn pinned_entity_ids(&self) -> Result<Vec<Uuid>, DbError> {
        Ok(self.tables.lock().unwrap().pins.clone())
    }

    async fn platform_ids(&self, entity_ids: &[Uuid]) -> Result<Vec<String>, DbError> {
        self.platform_lookups.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let mut ids: Vec<String> = tables
            .entities
            .iter()
            .filter(|e| entity_ids.contains(&e.id))
            .map(|e| e.platform_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn upsert_entity(&self, entity: &NewEntity<'_>) -> Result<Uuid, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = tables
            .entities
            .iter_mut()
            .find(|e| e.platform == entity.platform && e.platform_id == entity.platform_id)
        {
            existing.channel_title = entity.channel_title.map(ToOwned::to_owned);
            existing.channel_description = entity.channel_description.map(ToOwned::to_owned);
            existing.updated_at = now;
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        tables.entities.push(EntityRow {
            id,
            platform: entity.platform.to_string(),
            platform_id: entity.platform_id.to_string(),
            channel_title: entity.channel_title.map(ToOwned::to_owned),
            channel_description: entity.channel_description.map(ToOwned::to_owned),
            country: entity.country.map(ToOwned::to_owned),
            language: entity.language.map(ToOwned::to_owned),
            published_at: entity.published_at,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn insert_snapshot(&self, snapshot: &NewSnapshot<'_>) -> Result<Option<Uuid>, DbError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .snapshots
            .iter()
            .any(|s| s.run_id == snapshot.run_id && s.entity_id == snapshot.entity_id)
        {
            return Ok(None);
        }
        let entity = tables
            .entities
            .iter()
            .find(|e| e.id == snapshot.entity_id)
            .cloned()
            .ok_or(DbError::NotFound)?;
        let id = Uuid::new_v4();
        tables.snapshots.push(SnapshotRow {
            id,
            run_id: snapshot.run_id,
            entity_id: snapshot.entity_id,
            platform_id: entity.platform_id,
            display_name: entity.channel_title,
            subscriber_count: snapshot.subscriber_count,
            view_count: snapshot.view_count,
            video_count: snapshot.video_count,
            upload_freq_days: snapshot.upload_freq_days,
            category: snapshot.category.map(ToOwned::to_owned),
            recent_videos_json: snapshot.recent_videos_json.clone(),
            collected_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn snapshots_by_run(&self, run_id: Uuid) -> Result<Vec<SnapshotRow>, DbError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn last_score(
        &self,
        entity_id: Uuid,
        exclude_run: Option<Uuid>,
    ) -> Result<Option<ScoreRow>, DbError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .scores
            .iter()
            .filter(|s| s.entity_id == entity_id && Some(s.run_id) != exclude_run)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn upsert_score(&self, score: &NewScore<'_>) -> Result<Uuid, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let display_name = entity_name(&tables, score.entity_id);
        let existing = tables
            .scores
            .iter()
            .position(|s| s.run_id == score.run_id && s.entity_id == score.entity_id);
        let id = existing.map_or_else(Uuid::new_v4, |i| tables.scores.remove(i).id);
        tables.scores.push(ScoreRow {
            id,
            run_id: score.run_id,
            entity_id: score.entity_id,
            display_name,
            demand_match: score.demand_match,
            improvement_potential: score.improvement_potential,
            ability_to_pay: score.ability_to_pay,
            ease_of_contact: score.ease_of_contact,
            style_fit: score.style_fit,
            total_score: score.total_score,
            score_delta: score.score_delta,
            summary: score.summary.to_string(),
            fit_reasons: Json(score.fit_reasons.to_vec()),
            recommended_offer: score.recommended_offer.to_string(),
            tier: None,
            gpt_model: score.gpt_model.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn scores_by_run(&self, run_id: Uuid) -> Result<Vec<ScoreRow>, DbError> {
        Ok(self.scores_for(run_id))
    }

    async fn update_score_tier(&self, score_id: Uuid, tier: Tier) -> Result<(), DbError> {
        if self.fail_tier_updates {
            return Err(DbError::NotFound);
        }
        let mut tables = self.tables.lock().unwrap();
        let score = tables
            .scores
            .iter_mut()
            .find(|s| s.id == score_id)
            .ok_or(DbError::NotFound)?;
        score.tier = Some(tier.as_str().to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedLlm
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&Completion<'_>, usize) -> Result<String, PipelineError> + Send + Sync;

/// Answers each request through a closure given the request and the number
/// of earlier calls carrying the same user prompt.
pub struct ScriptedLlm {
    responder: Box<Responder>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(
        responder: impl Fn(&Completion<'_>, usize) -> Result<String, PipelineError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &Completion<'_>) -> Result<String, PipelineError> {
        let previous = {
            let mut prompts = self.prompts.lock().unwrap();
            let previous = prompts.iter().filter(|p| *p == request.user).count();
            prompts.push(request.user.to_string());
            previous
        };
        (self.responder)(request, previous)
    }
}

/// A valid rubric response whose components sum to `total` (0..=100).
pub fn score_json(total: i32) -> String {
    let mut remaining = total;
    let mut take = |max: i32| {
        let v = remaining.min(max);
        remaining -= v;
        v
    };
    json!({
        "demand_match": take(30),
        "improvement_potential": take(20),
        "ability_to_pay": take(15),
        "ease_of_contact": take(15),
        "style_fit": take(20),
        "summary": format!("Scored {total}"),
        "fit_reasons": ["steady uploads"],
        "recommended_offer": "Mixing support"
    })
    .to_string()
}

/// Name from the first line of a scoring prompt (`Channel: <name>`).
pub fn channel_name(request: &Completion<'_>) -> String {
    request
        .user
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Channel: "))
        .unwrap_or_default()
        .to_string()
}

pub fn is_scoring(request: &Completion<'_>) -> bool {
    request.json && request.user.starts_with("Channel: ")
}

// ---------------------------------------------------------------------------
// FakeCollector
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeChannel {
    pub name: String,
    pub subscribers: i64,
    pub hidden_subscribers: bool,
    pub upload_freq_days: Option<f64>,
}

impl FakeChannel {
    pub fn new(name: &str, subscribers: i64) -> Self {
        Self {
            name: name.to_string(),
            subscribers,
            hidden_subscribers: false,
            upload_freq_days: Some(3.0),
        }
    }

    /// A channel whose subscriber count the platform does not report.
    pub fn hiding_subscribers(mut self) -> Self {
        self.hidden_subscribers = true;
        self
    }

    pub fn platform_id(&self) -> String {
        format!("UC-{}", self.name)
    }
}

/// Writes one entity and snapshot per catalogue channel on every collect.
pub struct FakeCollector {
    store: Arc<MemoryStore>,
    catalogue: Vec<FakeChannel>,
    pub fail: bool,
    pub requested: Mutex<Vec<Vec<String>>>,
    pub resolved: Vec<String>,
}

impl FakeCollector {
    pub fn new(store: Arc<MemoryStore>, catalogue: Vec<FakeChannel>) -> Self {
        Self {
            store,
            catalogue,
            fail: false,
            requested: Mutex::new(Vec::new()),
            resolved: Vec::new(),
        }
    }
}

#[async_trait]
impl Collector for FakeCollector {
    async fn collect(
        &self,
        run_id: Uuid,
        _keywords: &[String],
        platform_ids: &[String],
    ) -> Result<CollectorResult, PipelineError> {
        self.requested.lock().unwrap().push(platform_ids.to_vec());
        if self.fail {
            return Err(PipelineError::PlatformApi {
                status: 403,
                context: "search".to_string(),
            });
        }

        let mut result = CollectorResult::default();
        for channel in &self.catalogue {
            let platform_id = channel.platform_id();
            let entity_id = self
                .store
                .upsert_entity(&NewEntity {
                    platform: "youtube",
                    platform_id: &platform_id,
                    channel_title: Some(&channel.name),
                    channel_description: None,
                    country: None,
                    language: None,
                    published_at: None,
                })
                .await?;
            self.store
                .insert_snapshot(&NewSnapshot {
                    run_id,
                    entity_id,
                    subscriber_count: (!channel.hidden_subscribers).then_some(channel.subscribers),
                    view_count: Some(channel.subscribers * 50),
                    video_count: Some(40),
                    upload_freq_days: channel.upload_freq_days,
                    category: Some("Music"),
                    recent_videos_json: json!([]),
                })
                .await?;
            result.entity_count += 1;
            result.snapshot_count += 1;
        }
        Ok(result)
    }

    async fn resolve_channels(&self, _channels: &[DiscoveredChannel]) -> Vec<String> {
        self.resolved.clone()
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Notify("webhook down".to_string()));
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
