//! Sync CLI commands: inspect and drive the push to the remote store.

use clap::{Args, Subcommand};
use chrono::Utc;

use staybook::{Collection, SyncEngine};

/// Inspect or push cloud sync state
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show the mode, remote and pending pushes
    Status,

    /// Retry queued pushes now
    Push {
        /// Also queue this collection's local contents before retrying
        #[arg(long)]
        collection: Option<Collection>,
    },
}

impl SyncCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SyncSubcommand::Status => self.status(engine).await,
            SyncSubcommand::Push { collection } => self.push(engine, *collection).await,
        }
    }

    async fn status(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let settings = engine.settings().get_settings().await;

        println!("Sync Status");
        println!("===========");
        println!();
        println!("Mode: {}", settings.mode);
        if settings.is_cloud() {
            match settings.remote_config() {
                Some(remote) => {
                    println!("Remote: {} (tenant {})", remote.server_url, remote.tenant_id)
                }
                None => println!("Remote: not configured"),
            }
        }
        println!();

        let pending = engine.pending_pushes().await?;
        if pending.is_empty() {
            println!("Outbox: empty");
        } else {
            println!("Outbox: {} pending", pending.len());
            let now = Utc::now();
            for entry in &pending {
                let due = if entry.next_attempt_at <= now {
                    "due now".to_string()
                } else {
                    format!(
                        "next attempt in {}s",
                        (entry.next_attempt_at - now).num_seconds()
                    )
                };
                println!(
                    "  {} ({} failed attempt(s), {}): {}",
                    entry.collection,
                    entry.attempts,
                    due,
                    entry.last_error.as_deref().unwrap_or("-")
                );
            }
        }

        Ok(())
    }

    async fn push(
        &self,
        engine: &SyncEngine,
        collection: Option<Collection>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let settings = engine.settings().get_settings().await;
        if !settings.is_cloud() {
            return Err("Not in cloud mode. Use `staybook settings set --mode cloud` first.".into());
        }

        if let Some(collection) = collection {
            engine
                .store()
                .outbox_upsert(collection, "queued manually")
                .await?;
        }

        let report = engine.flush_outbox().await?;
        if report.is_empty() {
            println!("Nothing to push.");
            return Ok(());
        }

        for collection in &report.pushed {
            println!("  ✓ {}", collection);
        }
        for collection in &report.retrying {
            println!("  … {} (will retry)", collection);
        }
        for collection in &report.dropped {
            println!("  ✗ {} (dropped)", collection);
        }

        if report.retrying.is_empty() && report.dropped.is_empty() {
            println!("\nPush complete.");
        }
        Ok(())
    }
}
