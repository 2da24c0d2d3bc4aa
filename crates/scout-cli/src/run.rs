//! `run` and `status` command handlers.

use scout_core::{AppConfig, RunType};
use scout_db::RunRow;
use scout_pipeline::{Orchestrator, RunRequest, RunSummary};
use sqlx::PgPool;
use uuid::Uuid;

/// Falls back to the configured default keywords when none were given.
pub(crate) fn resolve_keywords(keywords: Vec<String>, config: &AppConfig) -> Vec<String> {
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        config.default_keywords.clone()
    } else {
        keywords
    }
}

fn print_summary(run_id: Uuid, summary: &RunSummary) {
    println!("run {run_id}");
    println!(
        "  tracked {} | discovered {} | scanned {} | analyzed {} | skipped {}",
        summary.tracked, summary.discovered, summary.scanned, summary.analyzed, summary.skipped
    );
    println!(
        "  tiers: top {} | hot {} | watch {} | normal {}",
        summary.tiers.top, summary.tiers.hot, summary.tiers.watch, summary.tiers.normal
    );
    for pick in &summary.recommendations {
        println!("  #{} {}: {}", pick.rank, pick.display_name, pick.reason);
    }
    if let Some(trends) = &summary.trends {
        if !trends.keywords.is_empty() {
            println!("  trends: {}", trends.keywords.join(", "));
        }
    }
    if let Some(chunks) = summary.notified_chunks {
        println!("  report chunks sent: {chunks}");
    }
    for error in &summary.errors {
        println!("  ! {error}");
    }
}

/// Creates a run, executes it in the foreground, and prints its summary.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be wired or the run ends `failed`.
pub(crate) async fn run_scout(
    pool: PgPool,
    config: &AppConfig,
    keywords: Vec<String>,
    scheduled: bool,
    notify: bool,
) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_app_config(config, pool)?;
    let request = RunRequest {
        run_type: if scheduled {
            RunType::Scheduled
        } else {
            RunType::Manual
        },
        keywords: resolve_keywords(keywords, config),
        notify,
    };

    let run_id = orchestrator.create_run(&request).await?;
    tracing::info!(%run_id, keywords = ?request.keywords, "starting scout run");
    let summary = orchestrator.run(run_id, &request).await;
    print_summary(run_id, &summary);

    if let Some(fatal) = summary.fatal_error {
        anyhow::bail!("run {run_id} failed: {fatal}");
    }
    Ok(())
}

fn print_run_line(run: &RunRow) {
    let finished = run
        .finished_at
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
    println!(
        "{}  {:<9}  {:<9}  {}  {}",
        run.id,
        run.run_type,
        run.status,
        run.started_at.format("%Y-%m-%d %H:%M"),
        finished
    );
}

/// Prints one run with its stored summary, or the latest `limit` runs.
///
/// # Errors
///
/// Returns an error if the run is unknown or a query fails.
pub(crate) async fn run_status(pool: &PgPool, run_id: Option<Uuid>, limit: i64) -> anyhow::Result<()> {
    let Some(run_id) = run_id else {
        let runs = scout_db::list_runs(pool, limit).await?;
        if runs.is_empty() {
            println!("no runs recorded");
        }
        for run in &runs {
            print_run_line(run);
        }
        return Ok(());
    };

    let run = scout_db::get_run(pool, run_id).await?;
    print_run_line(&run);
    println!("config: {}", serde_json::to_string(&run.config)?);
    if let Some(summary) = &run.summary {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
