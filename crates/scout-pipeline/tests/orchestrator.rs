mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    channel_name, is_scoring, score_json, FakeChannel, FakeCollector, MemoryStore,
    RecordingNotifier, ScriptedLlm,
};
use scout_core::{AnalysisMode, RunStatus, RunType, Tier};
use scout_pipeline::{
    Completion, DiscoveryWorker, Orchestrator, Pacing, PipelineError, RunRequest, RunSettings,
};

fn settings() -> RunSettings {
    RunSettings {
        pacing: Pacing::immediate(),
        ..RunSettings::default()
    }
}

fn request(notify: bool) -> RunRequest {
    RunRequest {
        run_type: RunType::Manual,
        keywords: vec!["cover song".to_string()],
        notify,
    }
}

/// Scores every channel by a fixed table and answers trend requests.
fn totals_llm(table: &'static [(&'static str, i32)]) -> Arc<ScriptedLlm> {
    ScriptedLlm::new(move |request: &Completion<'_>, _| {
        if is_scoring(request) {
            let name = channel_name(request);
            let total = table
                .iter()
                .find(|(n, _)| *n == name)
                .map_or(50, |(_, t)| *t);
            Ok(score_json(total))
        } else {
            Ok("acoustic covers, lo-fi, city pop".to_string())
        }
    })
}

#[tokio::test]
async fn successful_run_scores_classifies_and_reports() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let earlier = store.seed_run(RunStatus::Failed, now - Duration::days(20));
    let aria_id = store.seed_entity("aria");
    store.seed_score(earlier, aria_id, 80, None, now - Duration::days(20));
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![
            FakeChannel::new("aria", 40_000),
            FakeChannel::new("bex", 9_000),
            FakeChannel::new("tiny", 120),
        ],
    ));
    let llm = totals_llm(&[("aria", 92), ("bex", 66)]);
    let notifier = Arc::new(RecordingNotifier::default());

    let orchestrator = Orchestrator::new(store.clone(), llm.clone(), collector, settings())
        .with_notifier(notifier.clone());
    let req = request(true);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.tiers.top, 2);
    assert_eq!(
        summary.trends.as_ref().map(|t| t.keywords.len()),
        Some(3)
    );
    assert_eq!(summary.notified_chunks, Some(1));

    let run = store.run(run_id);
    assert_eq!(run.status, "success");
    assert!(run.finished_at.is_some());
    let stored = run.summary.expect("summary stored");
    assert_eq!(stored["analyzed"], 2);
    assert_eq!(stored["trends"]["7d"][0], "acoustic covers");

    let scores = store.scores_for(run_id);
    assert_eq!(scores.len(), 2);
    let bex = scores.iter().find(|s| s.total_score == 66).unwrap();
    assert_eq!(bex.tier.as_deref(), Some(Tier::Top.as_str()));
    // aria is both top and hot; hot is written last
    let aria = scores.iter().find(|s| s.total_score == 92).unwrap();
    assert_eq!(aria.score_delta, 12);
    assert_eq!(aria.tier.as_deref(), Some(Tier::Hot.as_str()));
    assert_eq!(summary.tiers.hot, 1);

    let messages = notifier.messages.lock().unwrap();
    assert!(messages[0].contains("@aria"));
    assert!(messages[0].contains("📈 TREND KEYWORDS"));
}

#[tokio::test]
async fn configured_hot_threshold_drives_tiers_and_report() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let earlier = store.seed_run(RunStatus::Success, now - Duration::days(20));
    let aria_id = store.seed_entity("aria");
    store.seed_score(earlier, aria_id, 80, None, now - Duration::days(20));
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![FakeChannel::new("aria", 40_000)],
    ));
    let llm = totals_llm(&[("aria", 88)]);
    let notifier = Arc::new(RecordingNotifier::default());
    let strict = RunSettings {
        hot_threshold: 90,
        ..settings()
    };

    let orchestrator = Orchestrator::new(store.clone(), llm, collector, strict)
        .with_notifier(notifier.clone());
    let req = request(true);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    assert_eq!(summary.tiers.top, 1);
    assert_eq!(summary.tiers.hot, 0);
    let scores = store.scores_for(run_id);
    assert_eq!(scores[0].score_delta, 8);
    assert_eq!(scores[0].tier.as_deref(), Some(Tier::Top.as_str()));

    let messages = notifier.messages.lock().unwrap();
    assert!(messages[0].contains("Hot Threshold: 90"), "{}", messages[0]);
}

#[tokio::test]
async fn collector_failure_fails_the_run() {
    let store = MemoryStore::new();
    let mut collector = FakeCollector::new(store.clone(), vec![FakeChannel::new("aria", 40_000)]);
    collector.fail = true;
    let llm = totals_llm(&[]);
    let notifier = Arc::new(RecordingNotifier::default());

    let orchestrator = Orchestrator::new(store.clone(), llm.clone(), Arc::new(collector), settings())
        .with_notifier(notifier.clone());
    let req = request(true);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    let fatal = summary.fatal_error.expect("fatal error recorded");
    assert!(fatal.starts_with("collection stage failed"), "{fatal}");
    assert_eq!(store.run(run_id).status, "failed");
    assert!(llm.prompts.lock().unwrap().is_empty());
    assert!(notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tier_write_failure_fails_the_run() {
    let store = MemoryStore::failing_tier_updates();
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![FakeChannel::new("aria", 40_000)],
    ));

    let orchestrator = Orchestrator::new(store.clone(), totals_llm(&[]), collector, settings());
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert!(summary
        .fatal_error
        .is_some_and(|e| e.starts_with("classification stage failed")));
    assert_eq!(store.run(run_id).status, "failed");
    // scores written before the failure stay in place
    assert_eq!(store.scores_for(run_id).len(), 1);
}

#[tokio::test]
async fn trend_and_notify_failures_do_not_fail_the_run() {
    let store = MemoryStore::new();
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![FakeChannel::new("aria", 40_000)],
    ));
    let llm = ScriptedLlm::new(|request, _| {
        if is_scoring(request) {
            Ok(score_json(90))
        } else {
            Err(PipelineError::LlmApi {
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    });
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    });

    let orchestrator =
        Orchestrator::new(store.clone(), llm, collector, settings()).with_notifier(notifier);
    let req = request(true);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    let trends = summary.trends.expect("trends attempted");
    assert!(trends.error.is_some());
    assert!(trends.keywords.is_empty());
    assert_eq!(summary.notified_chunks, Some(0));
    assert_eq!(store.run(run_id).status, "success");
}

#[tokio::test]
async fn entity_failures_are_collected_not_fatal() {
    let store = MemoryStore::new();
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![
            FakeChannel::new("aria", 40_000),
            FakeChannel::new("garbled", 40_000),
        ],
    ));
    let llm = ScriptedLlm::new(|request, _| {
        if !is_scoring(request) {
            return Ok("covers".to_string());
        }
        if channel_name(request) == "garbled" {
            Ok("{\"oops\": true}".to_string())
        } else {
            Ok(score_json(70))
        }
    });

    let orchestrator = Orchestrator::new(store.clone(), llm.clone(), collector, settings());
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Analyzer skipped entity_id="));
    assert_eq!(llm.calls_containing("Channel: garbled"), 2);
    assert_eq!(summary.notified_chunks, None);
}

#[tokio::test]
async fn hidden_subscriber_count_is_screened_out() {
    let store = MemoryStore::new();
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![
            FakeChannel::new("aria", 40_000),
            FakeChannel::new("private", 40_000).hiding_subscribers(),
        ],
    ));
    let llm = totals_llm(&[("aria", 70)]);

    let orchestrator = Orchestrator::new(store.clone(), llm.clone(), collector, settings());
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.analyzed, 1);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert_eq!(llm.calls_containing("Channel: private"), 0);
    assert_eq!(store.scores_for(run_id).len(), 1);
}

#[tokio::test]
async fn recently_scored_normal_entities_are_screened_out() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let earlier = store.seed_run(RunStatus::Success, now - Duration::days(3));
    let quiet = store.seed_entity("quiet");
    store.seed_score(earlier, quiet, 40, Some(Tier::Normal), now - Duration::days(3));
    let hot = store.seed_entity("rising");
    store.seed_score(earlier, hot, 88, Some(Tier::Hot), now - Duration::days(3));

    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![FakeChannel::new("quiet", 8_000), FakeChannel::new("rising", 8_000)],
    ));
    let llm = totals_llm(&[("rising", 95)]);

    let orchestrator = Orchestrator::new(store.clone(), llm, collector.clone(), settings());
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.tracked, 1);
    assert_eq!(collector.requested.lock().unwrap()[0], vec!["UC-rising".to_string()]);

    let scores = store.scores_for(run_id);
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].score_delta, 7);
}

#[tokio::test]
async fn aggregated_mode_stores_recommendations_only() {
    let store = MemoryStore::new();
    let collector = Arc::new(FakeCollector::new(
        store.clone(),
        vec![FakeChannel::new("aria", 40_000), FakeChannel::new("bex", 9_000)],
    ));
    let llm = ScriptedLlm::new(|request, _| {
        if request.user.starts_with("Channels:") {
            Ok(r#"{"recommendations": [{"rank": 1, "display_name": "bex", "reason": "momentum"}]}"#
                .to_string())
        } else {
            Ok("covers".to_string())
        }
    });

    let orchestrator = Orchestrator::new(
        store.clone(),
        llm,
        collector,
        RunSettings {
            analysis_mode: AnalysisMode::Aggregated,
            ..settings()
        },
    );
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.fatal_error, None);
    assert_eq!(summary.recommendations.len(), 1);
    assert_eq!(summary.recommendations[0].display_name, "bex");
    assert_eq!(summary.tiers.top, 0);
    assert!(store.scores_for(run_id).is_empty());
}

#[tokio::test]
async fn discovered_channels_join_the_collection() {
    let store = MemoryStore::new();
    let pinned = store.seed_entity("pinned");
    store.pin(pinned);

    let mut collector = FakeCollector::new(store.clone(), Vec::new());
    collector.resolved = vec!["UC-found".to_string(), "UC-pinned".to_string()];
    let collector = Arc::new(collector);
    let search = ScriptedLlm::new(|_, _| {
        Ok(r#"{"discovered_channels": [{"name": "Found", "handle": "@found"}]}"#.to_string())
    });

    let orchestrator = Orchestrator::new(store.clone(), totals_llm(&[]), collector.clone(), settings())
        .with_discovery(DiscoveryWorker::new(search));
    let req = request(false);
    let run_id = orchestrator.create_run(&req).await.unwrap();
    let summary = orchestrator.run(run_id, &req).await;

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.tracked, 1);
    assert_eq!(
        collector.requested.lock().unwrap()[0],
        vec!["UC-pinned".to_string(), "UC-found".to_string()]
    );
}
