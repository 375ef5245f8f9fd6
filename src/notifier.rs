use crate::types::Table;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to deliver notification: {0}")]
    Transport(#[from] reqwest::Error),
}

/// `{table, record}` as handed to the notification endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub table: Table,
    pub record: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Posts every payload as JSON to a webhook, e.g. an email-sending function.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        info!(table = %payload.table, record = %payload.record, "New submission");
        Ok(())
    }
}

/// Fire-and-forget dispatch of submission notifications.
///
/// Each notification runs on its own task after the submission was stored.
/// Failures are logged and never reach the submitter.
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn from_url(url: Option<String>) -> Self {
        match url {
            Some(url) => Self::new(Arc::new(WebhookNotifier::new(url))),
            None => Self::new(Arc::new(LogNotifier)),
        }
    }

    pub fn dispatch<T: Serialize>(&self, table: Table, record: &T) -> Option<JoinHandle<()>> {
        let record = match serde_json::to_value(record) {
            Ok(record) => record,
            Err(err) => {
                warn!(?err, %table, "Notification dropped");
                return None;
            }
        };
        let payload = NotificationPayload { table, record };
        let notifier = self.notifier.clone();

        Some(tokio::spawn(async move {
            if let Err(err) = notifier.notify(&payload).await {
                warn!(?err, table = %payload.table, "Notification failed");
            }
        }))
    }
}
