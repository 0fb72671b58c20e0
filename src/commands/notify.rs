use clap::Args;

use staybook::mail::{notify_maintenance, SmtpMailer};
use staybook::{Config, SyncEngine};

/// Email a maintenance ticket to the maintenance contact
#[derive(Args)]
pub struct NotifyCommand {
    /// Maintenance ticket ID
    ticket_id: String,

    /// Send to this address instead of the configured maintenance email
    #[arg(long)]
    to: Option<String>,
}

impl NotifyCommand {
    pub async fn run(
        &self,
        engine: &SyncEngine,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let smtp = config
            .smtp
            .clone()
            .ok_or("SMTP is not configured. Add an `smtp` section to the config file.")?;

        let settings = engine.settings().get_settings().await;
        let to = self
            .to
            .clone()
            .or(settings.maintenance_email.clone())
            .ok_or("No maintenance email set. Use `staybook settings set --maintenance-email`.")?;

        let tickets = engine.get_maintenance().await?;
        let ticket = tickets
            .iter()
            .find(|t| t.id == self.ticket_id)
            .ok_or_else(|| format!("Maintenance ticket not found: {}", self.ticket_id))?;

        let mailer = SmtpMailer::new(smtp);
        notify_maintenance(&mailer, &to, &settings.hotel_name, ticket).await?;

        println!("Sent \"{}\" to {}", ticket.title, to);
        Ok(())
    }
}
