mod common;

use chrono::{Duration, Utc};
use common::{channel_name, score_json, MemoryStore, ScriptedLlm};
use scout_core::{RunStatus, Tier};
use scout_pipeline::{Pacing, PipelineError, ScoringEngine};

fn engine<'a>(llm: &'a ScriptedLlm, store: &'a MemoryStore, batch_size: usize) -> ScoringEngine<'a> {
    ScoringEngine::new(llm, store, batch_size).with_pacing(Pacing::immediate())
}

#[tokio::test]
async fn delta_is_measured_against_previous_run() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let previous = store.seed_run(RunStatus::Success, now - Duration::days(1));
    let entity = store.seed_entity("aria");
    store.seed_score(previous, entity, 70, Some(Tier::Watch), now - Duration::days(1));

    let run = store.seed_run(RunStatus::Running, now);
    let row = store.seed_snapshot(run, entity, Some(12_000));
    let llm = ScriptedLlm::new(|_, _| Ok(score_json(78)));

    let errors = engine(&llm, &store, 5).analyze_batch(run, &[row]).await;

    assert!(errors.is_empty(), "{errors:?}");
    let scores = store.scores_for(run);
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].total_score, 78);
    assert_eq!(scores[0].score_delta, 8);
    assert_eq!(scores[0].gpt_model, "scripted-model");
    assert_eq!(scores[0].tier, None);
}

#[tokio::test]
async fn delta_is_zero_for_first_score() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let entity = store.seed_entity("newcomer");
    let llm = ScriptedLlm::new(|_, _| Ok(score_json(64)));

    let delta = engine(&llm, &store, 5)
        .score_delta(entity, 64, run)
        .await
        .unwrap();

    assert_eq!(delta, 0);
}

#[tokio::test]
async fn invalid_output_is_retried_once() {
    let store = MemoryStore::new();
    let llm = ScriptedLlm::new(|_, attempt| {
        if attempt == 0 {
            Ok(r#"{"demand_match": 99}"#.to_string())
        } else {
            Ok(score_json(81))
        }
    });

    let output = engine(&llm, &store, 5)
        .score_one("Channel: aria")
        .await
        .unwrap();

    assert_eq!(output.total(), 81);
    assert_eq!(llm.calls_containing("Channel: aria"), 2);
}

#[tokio::test]
async fn empty_completion_is_retried_once() {
    let store = MemoryStore::new();
    let llm = ScriptedLlm::new(|_, attempt| {
        if attempt == 0 {
            Err(PipelineError::EmptyCompletion)
        } else {
            Ok(score_json(78))
        }
    });

    let output = engine(&llm, &store, 5)
        .score_one("Channel: aria")
        .await
        .unwrap();

    assert_eq!(output.total(), 78);
    assert_eq!(llm.calls_containing("Channel: aria"), 2);
}

#[tokio::test]
async fn second_invalid_output_is_an_error() {
    let store = MemoryStore::new();
    let llm = ScriptedLlm::new(|_, _| Ok("not json at all".to_string()));

    let err = engine(&llm, &store, 5)
        .score_one("Channel: aria")
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(llm.calls_containing("Channel: aria"), 2);
}

#[tokio::test]
async fn provider_errors_are_not_retried() {
    let store = MemoryStore::new();
    let llm = ScriptedLlm::new(|_, _| {
        Err(PipelineError::LlmApi {
            status: 429,
            body: "rate limited".to_string(),
        })
    });

    let err = engine(&llm, &store, 5)
        .score_one("Channel: aria")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::LlmApi { status: 429, .. }));
    assert_eq!(llm.calls_containing("Channel: aria"), 1);
}

#[tokio::test]
async fn batch_continues_past_failed_entity() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let rows: Vec<_> = ["a", "broken", "c", "d"]
        .into_iter()
        .map(|name| {
            let entity = store.seed_entity(name);
            store.seed_snapshot(run, entity, Some(5_000))
        })
        .collect();
    let broken_id = rows[1].entity_id;
    let llm = ScriptedLlm::new(|request, _| {
        if channel_name(request) == "broken" {
            Ok("{}".to_string())
        } else {
            Ok(score_json(70))
        }
    });

    let errors = engine(&llm, &store, 3).analyze_batch(run, &rows).await;

    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with(&format!("Analyzer skipped entity_id={broken_id}")));
    assert_eq!(store.scores_for(run).len(), 3);
}

#[tokio::test]
async fn unreadable_snapshot_is_reported_not_scored() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let entity = store.seed_entity("   ");
    let row = store.seed_snapshot(run, entity, Some(5_000));
    let llm = ScriptedLlm::new(|_, _| Ok(score_json(70)));

    let errors = engine(&llm, &store, 5).analyze_batch(run, &[row]).await;

    assert_eq!(errors.len(), 1);
    assert!(llm.prompts.lock().unwrap().is_empty());
    assert!(store.scores_for(run).is_empty());
}

#[tokio::test]
async fn rescoring_within_a_run_overwrites() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let entity = store.seed_entity("aria");
    let row = store.seed_snapshot(run, entity, Some(9_000));

    let first = ScriptedLlm::new(|_, _| Ok(score_json(60)));
    engine(&first, &store, 5).analyze_batch(run, &[row.clone()]).await;
    let second = ScriptedLlm::new(|_, _| Ok(score_json(75)));
    engine(&second, &store, 5).analyze_batch(run, &[row]).await;

    let scores = store.scores_for(run);
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].total_score, 75);
    assert_eq!(scores[0].score_delta, 0);
}

#[tokio::test]
async fn aggregated_returns_ranked_picks_without_scores() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let rows: Vec<_> = ["aria", "bex", "cy", "dot"]
        .into_iter()
        .map(|name| {
            let entity = store.seed_entity(name);
            store.seed_snapshot(run, entity, Some(5_000))
        })
        .collect();
    let llm = ScriptedLlm::new(|_, _| {
        Ok(serde_json::json!({
            "recommendations": [
                {"rank": 2, "display_name": "cy", "reason": "fast growth"},
                {"rank": 1, "display_name": "aria", "reason": "great vocals", "recommended_offer": "mixing"}
            ]
        })
        .to_string())
    });

    let picks = engine(&llm, &store, 5).analyze_aggregated(&rows).await.unwrap();

    let names: Vec<_> = picks.iter().map(|p| p.display_name.as_str()).collect();
    assert_eq!(names, vec!["aria", "cy"]);
    assert_eq!(picks[1].recommended_offer, "");
    assert!(store.scores_for(run).is_empty());
}

#[tokio::test]
async fn aggregated_rejects_unknown_channel() {
    let store = MemoryStore::new();
    let run = store.seed_run(RunStatus::Running, Utc::now());
    let entity = store.seed_entity("aria");
    let row = store.seed_snapshot(run, entity, Some(5_000));
    let llm = ScriptedLlm::new(|_, _| {
        Ok(r#"{"recommendations": [{"rank": 1, "display_name": "ghost", "reason": "?"}]}"#.to_string())
    });

    let err = engine(&llm, &store, 5)
        .analyze_aggregated(&[row])
        .await
        .unwrap_err();

    assert!(err.is_validation());
}
