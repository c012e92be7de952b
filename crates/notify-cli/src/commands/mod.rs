//! Command handlers. Shared wiring (adapter registry construction) lives
//! here; each subcommand gets its own module.

pub mod db;
pub mod run;
pub mod validate;
pub mod worker;

use notify_adapters::{AdapterRegistry, EmailAdapter, WhatsAppAdapter};
use notify_config::Settings;

/// Builds the adapter registry: email when SMTP is configured, whatsapp
/// always (it falls back to its simulation command when no CLI is wired),
/// matching `notify-daemon`'s wiring.
pub fn build_registry(settings: &Settings) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    if let Some(smtp_host) = &settings.smtp_host {
        let mut email = EmailAdapter::new(
            std::path::PathBuf::from(format!("{}/workflows/templates", settings.repository_root)),
            smtp_host.clone(),
            settings.smtp_port,
            settings
                .smtp_from
                .clone()
                .or_else(|| settings.smtp_username.clone())
                .unwrap_or_else(|| "notifications@example.com".to_string()),
        );
        email.username = settings.smtp_username.clone();
        email.password = settings.smtp_password.clone();
        email.use_starttls = settings.smtp_use_tls;
        registry.register("email", Box::new(email));
    }

    registry.register("whatsapp", Box::new(WhatsAppAdapter::new(None)));

    registry
}
