mod pins;
mod run;

use clap::{Parser, Subcommand};
use scout_core::AppConfig;
use scout_db::PoolConfig;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pins::PinsCommands;

#[derive(Debug, Parser)]
#[command(name = "scout-cli")]
#[command(about = "Creator scout command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scout pipeline once and wait for it to finish
    Run {
        /// Comma-separated search keywords (defaults to `SCOUT_DEFAULT_KEYWORDS`)
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        /// Record the run as scheduled instead of manual
        #[arg(long)]
        scheduled: bool,
        /// Skip posting the report to the webhook
        #[arg(long)]
        no_notify: bool,
    },
    /// Show one run, or the most recent runs when no id is given
    Status {
        run_id: Option<Uuid>,
        /// Maximum number of runs to list
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Manage always-tracked channels
    Pins {
        #[command(subcommand)]
        command: PinsCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_db_command(command: DbCommands) -> anyhow::Result<()> {
    let pool = scout_db::connect_pool_from_env().await?;
    match command {
        DbCommands::Ping => {
            scout_db::ping(&pool).await?;
            println!("database: ok");
        }
        DbCommands::Migrate => {
            let applied = scout_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

/// Loads configuration, starts logging at the configured level, and opens the pool.
async fn connect() -> anyhow::Result<(AppConfig, PgPool)> {
    let config = scout_core::load_app_config()?;
    init_tracing(&config.log_level);
    let pool =
        scout_db::connect_pool(&config.database_url, PoolConfig::from_app_config(&config)).await?;
    Ok((config, pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            keywords,
            scheduled,
            no_notify,
        }) => {
            let (config, pool) = connect().await?;
            run::run_scout(pool, &config, keywords, scheduled, !no_notify).await
        }
        Some(Commands::Status { run_id, limit }) => {
            let (_, pool) = connect().await?;
            run::run_status(&pool, run_id, limit).await
        }
        Some(Commands::Pins { command }) => {
            let (_, pool) = connect().await?;
            pins::run_pins(&pool, command).await
        }
        Some(Commands::Db { command }) => {
            init_tracing("info");
            run_db_command(command).await
        }
        None => {
            println!("scout-cli: use --help to list commands");
            Ok(())
        }
    }
}
