use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::{json, Value as Json};

use crate::adapter::{AdapterError, ChannelAdapter};
use crate::context_payload::{context_from_payload, today_utc};

/// Renders `<template>.txt` and optional `<template>.html` from
/// `templates_dir` and sends over SMTP. `subject`/`to` are taken from the
/// already-rendered action in the payload.
pub struct EmailAdapter {
    pub templates_dir: PathBuf,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_starttls: bool,
    pub default_from: String,
    pub clock: Box<dyn Fn() -> NaiveDate + Send + Sync>,
}

impl EmailAdapter {
    pub fn new(templates_dir: PathBuf, smtp_host: String, smtp_port: u16, default_from: String) -> Self {
        Self {
            templates_dir,
            smtp_host,
            smtp_port,
            username: None,
            password: None,
            use_starttls: true,
            default_from,
            clock: Box::new(today_utc),
        }
    }
}

impl ChannelAdapter for EmailAdapter {
    fn send(&self, payload: &Json) -> Result<Json, AdapterError> {
        let action = payload
            .get("action")
            .ok_or_else(|| AdapterError::Validation("missing action".to_string()))?;

        let to = action
            .get("to")
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::Validation("missing recipient 'to'".to_string()))?;

        let template_name = action
            .get("template")
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::Validation("missing 'template'".to_string()))?;

        let subject = action
            .get("subject")
            .and_then(Json::as_str)
            .unwrap_or("Notification")
            .to_string();

        let ctx = context_from_payload(payload);
        let today = (self.clock)();

        let text_path = self.templates_dir.join(format!("{template_name}.txt"));
        let text_source = fs::read_to_string(&text_path)
            .map_err(|e| AdapterError::Delivery(format!("read {}: {e}", text_path.display())))?;
        let text_body = notify_actions::render_template(&text_source, &ctx, today)
            .map_err(|e| AdapterError::Delivery(e.to_string()))?;

        let html_path = self.templates_dir.join(format!("{template_name}.html"));
        let html_body = if html_path.exists() {
            let html_source = fs::read_to_string(&html_path)
                .map_err(|e| AdapterError::Delivery(format!("read {}: {e}", html_path.display())))?;
            Some(
                notify_actions::render_template(&html_source, &ctx, today)
                    .map_err(|e| AdapterError::Delivery(e.to_string()))?,
            )
        } else {
            None
        };

        let from = action
            .get("from")
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_from.clone());
        let builder = Message::builder()
            .to(to.parse().map_err(|e| AdapterError::Validation(format!("invalid 'to': {e}")))?)
            .from(from.parse().map_err(|e| AdapterError::Delivery(format!("invalid from: {e}")))?)
            .subject(subject.clone());

        let email = match &html_body {
            Some(html) => builder
                .multipart(MultiPart::alternative().singlepart(SinglePart::plain(text_body.clone())).singlepart(SinglePart::html(html.clone())))
                .map_err(|e| AdapterError::Delivery(e.to_string()))?,
            None => builder
                .body(text_body.clone())
                .map_err(|e| AdapterError::Delivery(e.to_string()))?,
        };

        let mut transport = if self.use_starttls {
            SmtpTransport::starttls_relay(&self.smtp_host)
                .map_err(|e| AdapterError::Delivery(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&self.smtp_host)
        }
        .port(self.smtp_port);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport
            .build()
            .send(&email)
            .map_err(|e| AdapterError::Delivery(e.to_string()))?;

        Ok(json!({
            "status": "sent",
            "subject": subject,
            "to": to,
            "template": template_name,
        }))
    }
}
