use async_trait::async_trait;
use empresa_alerts::{
    ApiError, Channel, ChannelOutcome, ItemSource, MemoryStorage, Notification,
    NotificationSink, PollReport, SeenSetNotifier, Storage, WatchedItem, Watcher,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Response = Result<Vec<&'static str>, &'static str>;

/// Replays canned responses; the last one repeats once the queue drains.
struct ScriptedSource {
    responses: Mutex<VecDeque<Response>>,
    last: Mutex<Response>,
}

impl ScriptedSource {
    fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(Ok(Vec::new())),
        }
    }
}

#[async_trait]
impl ItemSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
        let next = {
            let mut responses = self.responses.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(response) = responses.pop_front() {
                *last = response.clone();
            }
            last.clone()
        };
        next.map(|ids| {
            ids.into_iter()
                .map(|id| WatchedItem {
                    id: id.to_string(),
                    summary: format!("item {id}"),
                })
                .collect()
        })
        .map_err(|message| ApiError::RequestFailed(message.to_string()))
    }
}

#[derive(Default)]
struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
    errors: Mutex<Vec<(Channel, String)>>,
}

impl RecordingSink {
    fn notified(&self) -> Vec<(Channel, Vec<String>)> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.channel, n.items.iter().map(|item| item.id.clone()).collect()))
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: &Notification) {
        self.notifications.lock().unwrap().push(notification.clone());
    }

    async fn report_error(&self, channel: Channel, error: &ApiError) {
        self.errors
            .lock()
            .unwrap()
            .push((channel, error.message().to_string()));
    }
}

fn watcher_with(
    storage: Arc<MemoryStorage>,
    sink: Arc<RecordingSink>,
    alerts: Vec<Response>,
    hardware: Vec<Response>,
) -> Watcher {
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![sink as Arc<dyn NotificationSink>];
    Watcher::new(sinks)
        .with_channel(
            Channel::Alerts,
            Box::new(ScriptedSource::new(alerts)),
            SeenSetNotifier::load(storage.clone(), "empresa_alerts_shown"),
        )
        .with_channel(
            Channel::Hardware,
            Box::new(ScriptedSource::new(hardware)),
            SeenSetNotifier::load(storage, "empresa_hardware_shown"),
        )
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[tokio::test]
async fn previously_shown_alert_is_not_repeated_after_restart() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set("empresa_alerts_shown", r#"["alert-1"]"#)
        .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_with(
        storage.clone(),
        sink.clone(),
        vec![Ok(vec!["alert-1", "alert-2"])],
        vec![Ok(vec![])],
    );

    let report = watcher.poll_once().await;

    assert_eq!(report.notified_ids(Channel::Alerts), ids(&["alert-2"]));
    assert_eq!(sink.notified(), vec![(Channel::Alerts, ids(&["alert-2"]))]);
    let shown = watcher.shown_ids(Channel::Alerts).await.unwrap();
    assert_eq!(shown, HashSet::from(["alert-1".to_string(), "alert-2".to_string()]));
    assert_eq!(
        storage.get("empresa_alerts_shown").unwrap(),
        Some(r#"["alert-1","alert-2"]"#.to_string())
    );
}

#[tokio::test]
async fn channels_keep_separate_histories() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_with(
        storage.clone(),
        sink.clone(),
        vec![Ok(vec!["same-id"])],
        vec![Ok(vec!["same-id"])],
    );

    watcher.poll_once().await;
    watcher.poll_once().await;

    assert_eq!(
        sink.notified(),
        vec![
            (Channel::Alerts, ids(&["same-id"])),
            (Channel::Hardware, ids(&["same-id"])),
        ]
    );
    assert!(storage.get("empresa_hardware_shown").unwrap().is_some());
    assert_eq!(watcher.badge_count(), 2);
}

#[tokio::test]
async fn failed_fetch_leaves_state_untouched_and_recovers_next_poll() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_with(
        storage,
        sink.clone(),
        vec![
            Ok(vec!["a"]),
            Err("Sin conexión - revisa tu internet"),
            Ok(vec!["a", "b"]),
        ],
        vec![Ok(vec![])],
    );

    watcher.poll_once().await;
    let failed = watcher.poll_once().await;
    assert_eq!(
        failed.outcome(Channel::Alerts),
        Some(&ChannelOutcome::Failed {
            channel: Channel::Alerts,
            message: "Sin conexión - revisa tu internet".to_string(),
        })
    );
    let status = watcher.status(Channel::Alerts).unwrap();
    assert_eq!(status.last_error.as_deref(), Some("Sin conexión - revisa tu internet"));
    assert_eq!(status.last_active, 1);
    assert_eq!(
        watcher.shown_ids(Channel::Alerts).await.unwrap(),
        HashSet::from(["a".to_string()])
    );

    let recovered = watcher.poll_once().await;
    assert_eq!(recovered.notified_ids(Channel::Alerts), ids(&["b"]));
    assert!(watcher.status(Channel::Alerts).unwrap().last_error.is_none());
    assert_eq!(
        sink.errors.lock().unwrap().clone(),
        vec![(Channel::Alerts, "Sin conexión - revisa tu internet".to_string())]
    );
}

#[tokio::test]
async fn empty_poll_then_reappearance_is_quiet() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_with(
        storage,
        sink.clone(),
        vec![Ok(vec!["a"]), Ok(vec![]), Ok(vec!["a"])],
        vec![Ok(vec![])],
    );

    watcher.poll_once().await;
    let empty = watcher.poll_once().await;
    assert_eq!(
        empty.outcome(Channel::Alerts),
        Some(&ChannelOutcome::Quiet {
            channel: Channel::Alerts
        })
    );
    assert_eq!(watcher.badge_count(), 0);
    watcher.poll_once().await;

    assert_eq!(sink.notified(), vec![(Channel::Alerts, ids(&["a"]))]);
}

#[tokio::test]
async fn clearing_history_renotifies_active_items() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(RecordingSink::default());
    let watcher = watcher_with(
        storage.clone(),
        sink.clone(),
        vec![Ok(vec!["a", "b"])],
        vec![Ok(vec!["hw-1"])],
    );

    watcher.poll_once().await;
    watcher.clear_history(Some(Channel::Alerts)).await;
    assert_eq!(storage.get("empresa_alerts_shown").unwrap(), None);
    assert!(storage.get("empresa_hardware_shown").unwrap().is_some());

    let report = watcher.poll_once().await;
    assert_eq!(report.notified_ids(Channel::Alerts), ids(&["a", "b"]));
    assert!(report.notified_ids(Channel::Hardware).is_empty());
}

/// Blocks inside `fetch` until released, to hold a poll in flight.
struct GatedSource {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ItemSource for GatedSource {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![WatchedItem {
            id: "slow".to_string(),
            summary: "slow item".to_string(),
        }])
    }
}

#[tokio::test]
async fn overlapping_poll_is_skipped() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(RecordingSink::default());
    let source = Arc::new(GatedSource {
        entered: Notify::new(),
        release: Notify::new(),
    });

    struct Shared(Arc<GatedSource>);

    #[async_trait]
    impl ItemSource for Shared {
        async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
            self.0.fetch().await
        }
    }

    let sinks: Vec<Arc<dyn NotificationSink>> = vec![sink.clone() as Arc<dyn NotificationSink>];
    let watcher = Arc::new(Watcher::new(sinks).with_channel(
        Channel::Alerts,
        Box::new(Shared(source.clone())),
        SeenSetNotifier::load(storage, "empresa_alerts_shown"),
    ));

    let first = tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.poll_once().await }
    });
    source.entered.notified().await;

    assert_eq!(watcher.poll_once().await, PollReport::Skipped);

    source.release.notify_one();
    let report = first.await.unwrap();
    assert_eq!(report.notified_ids(Channel::Alerts), ids(&["slow"]));
    assert_eq!(sink.notified().len(), 1);
}
