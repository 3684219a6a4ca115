//! Delivery backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{NotificationError, NotificationResult};
use crate::message::Notification;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> NotificationResult<()>;

    fn name(&self) -> &'static str;
}

/// Posts notifications as JSON to an HTTP relay that owns the provider integrations.
#[derive(Clone)]
pub struct RelaySender {
    client: Client,
    url: String,
    token: Option<String>,
}

impl RelaySender {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> NotificationResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl NotificationSender for RelaySender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        let mut request = self.client.post(&self.url).json(notification);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Relay {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            channel = %notification.channel,
            template = %notification.template,
            "notification relayed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        info!(
            channel = %notification.channel,
            to = %notification.to,
            template = %notification.template,
            locale = %notification.locale,
            data = %notification.data,
            "notification (log only)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
