use clap::{Args, Subcommand};

use super::OutputFormat;
use staybook::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!(
                            "database_path: {}",
                            config.database_path.value.display()
                        );
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("hotel_name: {}", config.hotel_name.value);
                        println!("  source: {}", config.hotel_name.source);
                        println!();

                        let remote = &config.remote;
                        println!("remote:");
                        println!(
                            "  server_url: {}",
                            remote.server_url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "  tenant_id: {}",
                            remote.tenant_id.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "  api_key: {}",
                            if remote.api_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!("  timeout: {}s", config.remote_timeout().as_secs());
                        if config.has_remote_params() && remote.to_remote_config().is_none() {
                            println!("  (incomplete: cloud mode stays off)");
                        }
                        println!();

                        println!(
                            "contact_email: {}",
                            config.contact_email.as_deref().unwrap_or("(not set)")
                        );
                        match &config.smtp {
                            Some(smtp) => {
                                println!("smtp: {}:{}", smtp.smtp_host, smtp.smtp_port)
                            }
                            None => println!("smtp: (not configured)"),
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
