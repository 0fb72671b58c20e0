use clap::Args;

use staybook::SyncEngine;

/// Load every collection, seeding demo data on first run, and retry queued pushes
#[derive(Args)]
pub struct BootstrapCommand {}

impl BootstrapCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let report = engine.bootstrap().await?;

        println!(
            "Mode: {}{}",
            report.mode,
            if report.demo_mode { " (demo)" } else { "" }
        );
        println!();
        for (collection, count) in &report.counts {
            println!("  {:<18} {}", collection.key(), count);
        }

        let outbox = &report.outbox;
        if !outbox.is_empty() {
            println!();
            println!(
                "Outbox: {} pushed, {} retrying, {} dropped",
                outbox.pushed.len(),
                outbox.retrying.len(),
                outbox.dropped.len()
            );
        }
        Ok(())
    }
}
