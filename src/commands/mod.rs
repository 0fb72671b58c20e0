mod bootstrap;
mod config_cmd;
mod data;
mod notify;
mod settings_cmd;
mod snapshot;
mod sync_cmd;

use clap::ValueEnum;

pub use bootstrap::BootstrapCommand;
pub use config_cmd::ConfigCommand;
pub use data::{ListCommand, PutCommand};
pub use notify::NotifyCommand;
pub use settings_cmd::SettingsCommand;
pub use snapshot::{ExportCommand, ImportCommand};
pub use sync_cmd::SyncCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
