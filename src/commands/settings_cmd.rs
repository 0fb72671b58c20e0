use clap::{Args, Subcommand};

use super::OutputFormat;
use staybook::remote::RemoteConfig;
use staybook::{Settings, SettingsRegistry, SyncMode};

#[derive(Args)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub command: SettingsSubcommand,
}

#[derive(Subcommand)]
pub enum SettingsSubcommand {
    /// Show the effective settings
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change settings; omitted values are kept
    Set {
        /// Sync mode (local or cloud)
        #[arg(long)]
        mode: Option<SyncMode>,

        /// Hotel display name
        #[arg(long)]
        hotel_name: Option<String>,

        /// Seed demo data into empty collections in local mode
        #[arg(long)]
        demo_mode: Option<bool>,

        /// Address that receives maintenance notifications
        #[arg(long)]
        maintenance_email: Option<String>,

        /// Remote store URL
        #[arg(long)]
        remote_url: Option<String>,

        /// Remote tenant ID
        #[arg(long)]
        tenant: Option<String>,

        /// Remote API key
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Discard saved settings and return to the defaults
    Reset,
}

impl SettingsCommand {
    pub async fn run(&self, registry: &SettingsRegistry) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SettingsSubcommand::Show { format } => {
                let settings = registry.get_settings().await;
                match format {
                    OutputFormat::Json => {
                        let mut value = serde_json::to_value(&settings)?;
                        if let Some(remote) = value.get_mut("remote").and_then(|r| r.as_object_mut()) {
                            remote.remove("apiKey");
                        }
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => print_settings(&settings),
                }
                Ok(())
            }
            SettingsSubcommand::Set {
                mode,
                hotel_name,
                demo_mode,
                maintenance_email,
                remote_url,
                tenant,
                api_key,
            } => {
                let mut settings = registry.get_settings().await;

                if let Some(name) = hotel_name {
                    if name.trim().is_empty() {
                        return Err("Hotel name cannot be empty".into());
                    }
                    settings.hotel_name = name.trim().to_string();
                }
                if let Some(demo_mode) = demo_mode {
                    settings.demo_mode = *demo_mode;
                }
                if let Some(email) = maintenance_email {
                    settings.maintenance_email = Some(email.clone()).filter(|e| !e.is_empty());
                }

                if remote_url.is_some() || tenant.is_some() || api_key.is_some() {
                    let mut remote = settings.remote.take().unwrap_or_default();
                    if let Some(url) = remote_url {
                        remote.server_url = url.clone();
                    }
                    if let Some(tenant) = tenant {
                        remote.tenant_id = tenant.clone();
                    }
                    if let Some(key) = api_key {
                        remote.api_key = key.clone();
                    }
                    settings.remote = Some(remote);
                }

                if let Some(mode) = mode {
                    settings.mode = *mode;
                }
                if settings.is_cloud() && settings.remote_config().is_none() {
                    return Err(
                        "Cloud mode needs --remote-url, --tenant and --api-key".into(),
                    );
                }

                registry.save_settings(settings.clone()).await?;
                println!("Settings saved:");
                print_settings(&settings);
                Ok(())
            }
            SettingsSubcommand::Reset => {
                registry.reset().await?;
                let settings = registry.get_settings().await;
                println!("Settings reset to defaults:");
                print_settings(&settings);
                Ok(())
            }
        }
    }
}

fn print_settings(settings: &Settings) {
    println!("hotel_name: {}", settings.hotel_name);
    println!("mode: {}", settings.mode);
    println!("demo_mode: {}", settings.demo_mode);
    match &settings.remote {
        Some(RemoteConfig {
            server_url,
            tenant_id,
            ..
        }) => println!("remote: {} (tenant {})", server_url, tenant_id),
        None => println!("remote: (not set)"),
    }
    println!(
        "maintenance_email: {}",
        settings.maintenance_email.as_deref().unwrap_or("(not set)")
    );
    println!(
        "contact_email: {}",
        settings.contact_email.as_deref().unwrap_or("(not set)")
    );
}
