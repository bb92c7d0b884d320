//! One poll cycle across every watched channel.
//!
//! The watcher fetches each channel's active items, runs them through that
//! channel's [`SeenSetNotifier`] and hands any detection to the sinks. A
//! failed fetch only updates the channel's error indicator.

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{AlertItem, HardwareIncident};
use crate::notifier::SeenSetNotifier;
use crate::sink::{Notification, NotificationSink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Alerts,
    Hardware,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Alerts => "alerts",
            Channel::Hardware => "hardware",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An active item reduced to what the notifier and the sinks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedItem {
    pub id: String,
    pub summary: String,
}

impl From<&AlertItem> for WatchedItem {
    fn from(alert: &AlertItem) -> Self {
        Self {
            id: alert.id.clone(),
            summary: alert.summary(),
        }
    }
}

impl From<&HardwareIncident> for WatchedItem {
    fn from(incident: &HardwareIncident) -> Self {
        Self {
            id: incident.id.clone(),
            summary: incident.summary(),
        }
    }
}

#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError>;
}

pub struct ActiveAlertsSource {
    client: ApiClient,
    empresa_id: String,
    limit: u32,
}

impl ActiveAlertsSource {
    pub fn new(client: ApiClient, empresa_id: impl Into<String>, limit: u32) -> Self {
        Self {
            client,
            empresa_id: empresa_id.into(),
            limit,
        }
    }
}

#[async_trait]
impl ItemSource for ActiveAlertsSource {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
        let alerts = self
            .client
            .active_alerts(&self.empresa_id, self.limit, 0)
            .await?;
        // Records without an id cannot be deduplicated.
        Ok(alerts
            .iter()
            .filter(|alert| !alert.id.is_empty())
            .map(WatchedItem::from)
            .collect())
    }
}

pub struct HardwareIncidentsSource {
    client: ApiClient,
}

impl HardwareIncidentsSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ItemSource for HardwareIncidentsSource {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
        let incidents = self.client.hardware_incidents().await?;
        Ok(incidents.iter().map(WatchedItem::from).collect())
    }
}

/// Last known state of a channel, as shown next to its badge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Active items at the last successful poll.
    pub last_active: usize,
    /// Set while the most recent poll failed.
    pub last_error: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Notified { channel: Channel, ids: Vec<String> },
    Quiet { channel: Channel },
    Failed { channel: Channel, message: String },
}

impl ChannelOutcome {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelOutcome::Notified { channel, .. }
            | ChannelOutcome::Quiet { channel }
            | ChannelOutcome::Failed { channel, .. } => *channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollReport {
    /// Another poll was still running.
    Skipped,
    Completed(Vec<ChannelOutcome>),
}

impl PollReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        match self {
            PollReport::Skipped => None,
            PollReport::Completed(outcomes) => {
                outcomes.iter().find(|outcome| outcome.channel() == channel)
            }
        }
    }

    pub fn notified_ids(&self, channel: Channel) -> Vec<String> {
        match self.outcome(channel) {
            Some(ChannelOutcome::Notified { ids, .. }) => ids.clone(),
            _ => Vec::new(),
        }
    }
}

struct WatchedChannel {
    channel: Channel,
    source: Box<dyn ItemSource>,
    notifier: Mutex<SeenSetNotifier>,
    status: StdMutex<ChannelStatus>,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Watcher {
    channels: Vec<WatchedChannel>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    in_flight: AtomicBool,
}

impl Watcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self {
            channels: Vec::new(),
            sinks,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_channel(
        mut self,
        channel: Channel,
        source: Box<dyn ItemSource>,
        notifier: SeenSetNotifier,
    ) -> Self {
        self.channels.push(WatchedChannel {
            channel,
            source,
            notifier: Mutex::new(notifier),
            status: StdMutex::new(ChannelStatus::default()),
        });
        self
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|watched| watched.channel).collect()
    }

    /// Polls every channel in order. Returns [`PollReport::Skipped`] without
    /// touching any state when a previous poll has not finished yet.
    pub async fn poll_once(&self) -> PollReport {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("previous poll still in flight, skipping");
            return PollReport::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let mut outcomes = Vec::with_capacity(self.channels.len());
        for watched in &self.channels {
            outcomes.push(self.poll_channel(watched).await);
        }
        PollReport::Completed(outcomes)
    }

    async fn poll_channel(&self, watched: &WatchedChannel) -> ChannelOutcome {
        let channel = watched.channel;
        let items = match watched.source.fetch().await {
            Ok(items) => items,
            Err(error) => {
                self.update_status(watched, |status| {
                    status.last_error = Some(error.message().to_string());
                });
                for sink in &self.sinks {
                    sink.report_error(channel, &error).await;
                }
                return ChannelOutcome::Failed {
                    channel,
                    message: error.message().to_string(),
                };
            }
        };

        let detection = {
            let mut notifier = watched.notifier.lock().await;
            notifier.observe(items.iter().map(|item| item.id.clone()))
        };
        let active = items.len();
        self.update_status(watched, |status| {
            status.last_active = active;
            status.last_error = None;
        });
        tracing::debug!(%channel, active, "poll completed");

        let Some(detection) = detection else {
            return ChannelOutcome::Quiet { channel };
        };

        let new_items: Vec<WatchedItem> = detection
            .new_ids
            .iter()
            .filter_map(|id| items.iter().find(|item| &item.id == id).cloned())
            .collect();
        let notification = Notification {
            channel,
            items: new_items,
            first_load: detection.first_load,
        };
        for sink in &self.sinks {
            sink.notify(&notification).await;
        }
        ChannelOutcome::Notified {
            channel,
            ids: detection.new_ids,
        }
    }

    fn update_status<F>(&self, watched: &WatchedChannel, f: F)
    where
        F: FnOnce(&mut ChannelStatus),
    {
        let mut status = watched
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut status);
        status.checked_at = Some(Utc::now());
    }

    pub fn status(&self, channel: Channel) -> Option<ChannelStatus> {
        self.channels
            .iter()
            .find(|watched| watched.channel == channel)
            .map(|watched| {
                watched
                    .status
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone()
            })
    }

    /// Active items across all channels as of their last successful poll.
    pub fn badge_count(&self) -> usize {
        self.channels
            .iter()
            .filter_map(|watched| self.status(watched.channel))
            .map(|status| status.last_active)
            .sum()
    }

    /// Clears notification history for one channel, or all when `None`.
    pub async fn clear_history(&self, channel: Option<Channel>) {
        for watched in &self.channels {
            if channel.map_or(true, |target| target == watched.channel) {
                watched.notifier.lock().await.clear_history();
            }
        }
    }

    pub async fn shown_ids(&self, channel: Channel) -> Option<HashSet<String>> {
        for watched in &self.channels {
            if watched.channel == channel {
                return Some(watched.notifier.lock().await.shown_ids().clone());
            }
        }
        None
    }
}
