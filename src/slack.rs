use crate::error::ApiError;
use crate::sink::{Notification, NotificationSink};
use crate::watcher::Channel;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Serialize)]
struct WebhookPayload {
    text: String,
}

/// Posts notifications to a Slack incoming webhook. Delivery failures are
/// logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct SlackSink {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }

    async fn post(&self, text: String) -> Result<(), String> {
        let payload = WebhookPayload { text };

        let res = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Slack webhook error {}: {}", status, body));
        }

        Ok(())
    }
}

pub fn format_message(notification: &Notification) -> String {
    let icon = match notification.channel {
        Channel::Alerts => "🚨",
        Channel::Hardware => "🛠️",
    };
    let mut text = format!("{} *{}*", icon, notification.headline());
    for item in &notification.items {
        text.push_str(&format!("\n• {}", item.summary));
    }
    text
}

#[async_trait]
impl NotificationSink for SlackSink {
    async fn notify(&self, notification: &Notification) {
        match self.post(format_message(notification)).await {
            Ok(()) => tracing::debug!(channel = %notification.channel, "notification sent to Slack"),
            Err(e) => tracing::error!(channel = %notification.channel, error = %e, "Slack error"),
        }
    }

    async fn report_error(&self, _channel: Channel, _error: &ApiError) {}
}
