mod api;
mod launcher;
mod middleware;
mod scheduler;

use std::sync::Arc;

use scout_pipeline::Orchestrator;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    launcher::RunLauncher,
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(scout_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = scout_db::PoolConfig::from_app_config(&config);
    let pool = scout_db::connect_pool(&config.database_url, pool_config).await?;
    scout_db::run_migrations(&pool).await?;

    let launcher = match Orchestrator::from_app_config(&config, pool.clone()) {
        Ok(orchestrator) => Some(RunLauncher::new(orchestrator)),
        Err(e) => {
            tracing::warn!(error = %e, "scout pipeline disabled; run endpoints will return 503");
            None
        }
    };

    let _scheduler = match &launcher {
        Some(launcher) => Some(
            scheduler::build_scheduler(
                launcher.clone(),
                &config.run_cron,
                config.default_keywords.clone(),
            )
            .await?,
        ),
        None => None,
    };

    let auth = AuthState::from_env(matches!(config.env, scout_core::Environment::Development))?;
    let state = AppState {
        pool,
        launcher,
        default_keywords: Arc::new(config.default_keywords.clone()),
    };
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "scout-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
