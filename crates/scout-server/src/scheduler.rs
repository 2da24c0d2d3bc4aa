//! Background job scheduler.
//!
//! Registers the recurring scout run at server startup.

use std::sync::Arc;

use scout_core::RunType;
use scout_pipeline::RunRequest;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::launcher::RunLauncher;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    launcher: RunLauncher,
    cron: &str,
    keywords: Vec<String>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_scout_job(&scheduler, launcher, cron, keywords).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the scheduled scout run. Each tick starts a `scheduled` run with
/// the default keywords and report delivery enabled.
async fn register_scout_job(
    scheduler: &JobScheduler,
    launcher: RunLauncher,
    cron: &str,
    keywords: Vec<String>,
) -> Result<(), JobSchedulerError> {
    let keywords = Arc::new(keywords);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let launcher = launcher.clone();
        let keywords = Arc::clone(&keywords);

        Box::pin(async move {
            let request = RunRequest {
                run_type: RunType::Scheduled,
                keywords: keywords.as_ref().clone(),
                notify: true,
            };
            match launcher.start(request).await {
                Ok(run_id) => tracing::info!(%run_id, "scheduler: scout run started"),
                Err(e) => tracing::error!(error = %e, "scheduler: failed to start scout run"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: scout run registered");
    Ok(())
}
