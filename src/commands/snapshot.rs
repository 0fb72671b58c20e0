use clap::Args;
use std::path::PathBuf;

use staybook::SyncEngine;

/// Write every local collection and the settings to a snapshot file
#[derive(Args)]
pub struct ExportCommand {
    /// Destination file
    #[arg(long, short)]
    output: PathBuf,
}

impl ExportCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = engine.write_snapshot(&self.output).await?;
        let records: usize = snapshot.data.values().map(Vec::len).sum();
        println!(
            "Exported {} record(s) in {} collection(s) to {}",
            records,
            snapshot.data.len(),
            self.output.display()
        );
        Ok(())
    }
}

/// Replace local collections with the contents of a snapshot file
#[derive(Args)]
pub struct ImportCommand {
    /// Snapshot file to read
    #[arg(long, short)]
    input: PathBuf,
}

impl ImportCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let imported = engine.read_snapshot(&self.input).await?;
        if imported.is_empty() {
            println!("Snapshot contained no known collections.");
        } else {
            let names: Vec<&str> = imported.iter().map(|c| c.key()).collect();
            println!("Imported {}", names.join(", "));
        }
        Ok(())
    }
}
