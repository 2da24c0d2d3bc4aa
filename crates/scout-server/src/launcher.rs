//! Starts scout runs on background tasks.

use std::sync::Arc;

use scout_pipeline::{Orchestrator, PipelineError, RunRequest};
use uuid::Uuid;

/// Shared handle used by the HTTP routes and the scheduler.
#[derive(Clone)]
pub struct RunLauncher {
    orchestrator: Arc<Orchestrator>,
}

impl RunLauncher {
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Records a `running` run and executes it on a spawned task, returning
    /// as soon as the run row exists.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if the run cannot be created.
    pub async fn start(&self, request: RunRequest) -> Result<Uuid, PipelineError> {
        let run_id = self.orchestrator.create_run(&request).await?;
        let orchestrator = Arc::clone(&self.orchestrator);

        tokio::spawn(async move {
            let summary = orchestrator.run(run_id, &request).await;
            tracing::info!(
                %run_id,
                analyzed = summary.analyzed,
                errors = summary.errors.len(),
                failed = summary.fatal_error.is_some(),
                "background scout run finished"
            );
        });

        Ok(run_id)
    }
}
