// Staff notification: one fire-and-forget message per contract or exit report.
use crate::error::{Error, Result};
use log::{info, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

pub const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Fields the mail template interpolates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub to_email: String,
    pub full_name: String,
    pub doc_number: String,
    pub artistic_name: String,
    pub download_link: String,
    pub pdf_link: String,
    pub name: String,
    pub message: String,
}

impl Notification {
    pub fn new(to_email: &str, full_name: &str, doc_number: &str, artistic_name: &str, link: &str, message: String) -> Self {
        Self {
            to_email: to_email.to_string(),
            full_name: full_name.to_string(),
            doc_number: doc_number.to_string(),
            artistic_name: artistic_name.to_string(),
            download_link: link.to_string(),
            pdf_link: link.to_string(),
            name: full_name.to_string(),
            message,
        }
    }
}

pub trait Notifier {
    /// Never fails the caller; problems are logged.
    fn notify(&self, notification: &Notification);
}

#[derive(Debug, Clone)]
pub struct EmailJsConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a Notification,
}

pub struct EmailJsNotifier {
    client: Client,
    config: EmailJsConfig,
    url: String,
}

impl EmailJsNotifier {
    pub fn new(config: EmailJsConfig, timeout: Duration) -> Result<Self> {
        Self::with_url(config, timeout, EMAILJS_SEND_URL)
    }

    pub fn with_url(config: EmailJsConfig, timeout: Duration, url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("build mail client: {e}")))?;
        Ok(Self { client, config, url: url.to_string() })
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let body = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: notification,
        };
        let resp = self.client.post(&self.url).json(&body).send()?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(Error::Network(format!("mail service answered {status}: {text}")));
        }
        Ok(())
    }
}

impl Notifier for EmailJsNotifier {
    fn notify(&self, notification: &Notification) {
        match self.send(notification) {
            Ok(()) => info!("notified {} about {}", notification.to_email, notification.doc_number),
            Err(e) => warn!("notification for {} not sent: {e}", notification.doc_number),
        }
    }
}

/// Used when no mail service is configured.
pub struct NoNotify;

impl Notifier for NoNotify {
    fn notify(&self, notification: &Notification) {
        info!("notification skipped (no mail service): {}", notification.message);
    }
}
