use std::env;
use std::time::Duration;

/// Process-wide runtime settings sourced from the environment, mirroring the
/// field set the source system reads out of its settings object.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_use_tls: bool,
    pub adapter_timeout: Duration,
    pub repository_root: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            database_url: env::var("NOTIFY_DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/notify".to_string()),
            smtp_host: env::var("NOTIFY_SMTP_HOST").ok(),
            smtp_port: env::var("NOTIFY_SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            smtp_username: env::var("NOTIFY_SMTP_USERNAME").ok(),
            smtp_password: env::var("NOTIFY_SMTP_PASSWORD").ok(),
            smtp_from: env::var("NOTIFY_SMTP_FROM").ok(),
            smtp_use_tls: env::var("NOTIFY_SMTP_USE_TLS")
                .ok()
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
            adapter_timeout: Duration::from_secs(
                env::var("NOTIFY_ADAPTER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            repository_root: env::var("NOTIFY_REPOSITORY_ROOT")
                .unwrap_or_else(|_| ".".to_string()),
        }
    }
}
