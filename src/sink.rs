use crate::error::ApiError;
use crate::watcher::{Channel, WatchedItem};
use async_trait::async_trait;

/// One user-facing notification: every newly active item of a channel for a
/// single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub items: Vec<WatchedItem>,
    pub first_load: bool,
}

impl Notification {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn headline(&self) -> String {
        let count = self.items.len();
        match (self.channel, count) {
            (Channel::Alerts, 1) => "Nueva alerta activa".to_string(),
            (Channel::Alerts, n) => format!("{n} nuevas alertas activas"),
            (Channel::Hardware, 1) => "Nueva incidencia de hardware".to_string(),
            (Channel::Hardware, n) => format!("{n} nuevas incidencias de hardware"),
        }
    }
}

/// Where notifications and transient poll errors end up.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification);

    async fn report_error(&self, channel: Channel, error: &ApiError);
}

/// Emits notifications as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) {
        tracing::info!(
            channel = %notification.channel,
            first_load = notification.first_load,
            ids = ?notification.ids(),
            "{}",
            notification.headline()
        );
        for item in &notification.items {
            tracing::info!(channel = %notification.channel, id = %item.id, "[NEW] {}", item.summary);
        }
    }

    async fn report_error(&self, channel: Channel, error: &ApiError) {
        tracing::warn!(%channel, error = %error, "poll failed, retrying on next tick");
    }
}
