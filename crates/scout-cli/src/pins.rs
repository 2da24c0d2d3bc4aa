//! `pins` command handlers.

use clap::Subcommand;
use scout_pipeline::collector::PLATFORM;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum PinsCommands {
    /// Pin a channel by platform id so every run re-surveys it
    Add {
        /// YouTube channel id (e.g., UCxxxx)
        platform_id: String,
        #[arg(long)]
        note: Option<String>,
        /// Who pinned it
        #[arg(long)]
        by: Option<String>,
    },
    /// List pinned channels, oldest first
    List,
    /// Remove a pin by entity id
    Remove { entity_id: Uuid },
}

pub(crate) async fn run_pins(pool: &PgPool, command: PinsCommands) -> anyhow::Result<()> {
    match command {
        PinsCommands::Add {
            platform_id,
            note,
            by,
        } => {
            let entity_id = scout_db::ensure_entity(pool, PLATFORM, platform_id.trim()).await?;
            scout_db::upsert_pin(pool, entity_id, note.as_deref(), by.as_deref()).await?;
            println!("pinned {platform_id} (entity {entity_id})");
        }
        PinsCommands::List => {
            let pins = scout_db::list_pins(pool).await?;
            if pins.is_empty() {
                println!("no pins");
            }
            for pin in &pins {
                println!(
                    "{}  {:<26}  {}  {}",
                    pin.entity_id,
                    pin.platform_id,
                    pin.display_name.as_deref().unwrap_or("-"),
                    pin.note.as_deref().unwrap_or("")
                );
            }
        }
        PinsCommands::Remove { entity_id } => {
            scout_db::delete_pin(pool, entity_id).await?;
            println!("unpinned {entity_id}");
        }
    }
    Ok(())
}
