use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    BootstrapCommand, ConfigCommand, ExportCommand, ImportCommand, ListCommand, NotifyCommand,
    PutCommand, SettingsCommand, SyncCommand,
};
use staybook::remote::HttpConnector;
use staybook::{Config, LocalStore, SettingsRegistry, SyncEngine};

#[derive(Parser)]
#[command(name = "staybook")]
#[command(version)]
#[command(about = "Local-first hotel property management data with cloud sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigCommand),

    /// Show or change hotel settings
    Settings(SettingsCommand),

    /// Load every collection and retry queued pushes
    Bootstrap(BootstrapCommand),

    /// List a collection's records
    List(ListCommand),

    /// Replace a collection from a JSON file
    Put(PutCommand),

    /// Export local data to a snapshot file
    Export(ExportCommand),

    /// Import a snapshot file
    Import(ImportCommand),

    /// Cloud sync status and manual push
    Sync(SyncCommand),

    /// Email a maintenance ticket
    Notify(NotifyCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staybook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let engine = open_engine(&config).await?;

    match command {
        Commands::Config(_) => {}
        Commands::Settings(cmd) => cmd.run(engine.settings()).await?,
        Commands::Bootstrap(cmd) => cmd.run(&engine).await?,
        Commands::List(cmd) => cmd.run(&engine).await?,
        Commands::Put(cmd) => cmd.run(&engine).await?,
        Commands::Export(cmd) => cmd.run(&engine).await?,
        Commands::Import(cmd) => cmd.run(&engine).await?,
        Commands::Sync(cmd) => cmd.run(&engine).await?,
        Commands::Notify(cmd) => cmd.run(&engine, &config).await?,
    }

    Ok(())
}

async fn open_engine(config: &Config) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let store = LocalStore::open(&config.database_path.value).await?;
    let connector = Arc::new(HttpConnector::new(config.remote_timeout()));
    let settings = SettingsRegistry::init(store.clone(), config.bootstrap(), connector);
    Ok(SyncEngine::new(store, settings))
}
