use async_trait::async_trait;
use empresa_alerts::{
    ApiError, Channel, ItemSource, MemoryStorage, NotificationSink, PollReport, Poller,
    SeenSetNotifier, WatchedItem, Watcher,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts fetches and reports one extra item per call.
struct CountingSource {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ItemSource for CountingSource {
    async fn fetch(&self) -> Result<Vec<WatchedItem>, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((1..=call)
            .map(|n| WatchedItem {
                id: format!("alert-{n}"),
                summary: format!("alert {n}"),
            })
            .collect())
    }
}

fn counting_watcher() -> (Arc<Watcher>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let storage = Arc::new(MemoryStorage::new());
    let sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    let watcher = Watcher::new(sinks).with_channel(
        Channel::Alerts,
        Box::new(CountingSource {
            calls: calls.clone(),
        }),
        SeenSetNotifier::load(storage, "empresa_alerts_shown"),
    );
    (Arc::new(watcher), calls)
}

#[tokio::test]
async fn start_polls_immediately_and_refresh_reports_new_items() {
    let (watcher, calls) = counting_watcher();
    let poller = Poller::start(watcher, Duration::from_secs(3600)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        poller.initial_report().notified_ids(Channel::Alerts),
        vec!["alert-1".to_string()]
    );

    let report = poller.refresh().await.expect("poller running");
    assert_eq!(report.notified_ids(Channel::Alerts), vec!["alert-2".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    poller.stop().await.expect("clean stop");
}

#[tokio::test]
async fn interval_keeps_polling_until_stopped() {
    let (watcher, calls) = counting_watcher();
    let poller = Poller::start(watcher, Duration::from_millis(20)).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    poller.stop().await.expect("clean stop");
    let after_stop = calls.load(Ordering::SeqCst);
    assert!(after_stop >= 3, "expected several polls, got {after_stop}");

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn pause_suspends_ticks_and_resume_polls_immediately() {
    let (watcher, calls) = counting_watcher();
    let poller = Poller::start(watcher, Duration::from_millis(20)).await;

    poller.pause().await.expect("pause acknowledged");
    let paused_at = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), paused_at);

    let report = poller.resume().await.expect("resume polls");
    assert!(matches!(report, PollReport::Completed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), paused_at + 1);
    assert_eq!(
        report.notified_ids(Channel::Alerts),
        vec![format!("alert-{}", paused_at + 1)]
    );

    poller.stop().await.expect("clean stop");
}

#[tokio::test]
async fn refresh_still_works_while_paused() {
    let (watcher, calls) = counting_watcher();
    let poller = Poller::start(watcher, Duration::from_secs(3600)).await;

    poller.pause().await.expect("pause acknowledged");
    poller.refresh().await.expect("manual refresh");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    poller.stop().await.expect("clean stop");
}

#[tokio::test]
async fn watcher_survives_a_poller_restart() {
    let (watcher, _calls) = counting_watcher();
    let poller = Poller::start(watcher.clone(), Duration::from_secs(3600)).await;
    poller.stop().await.expect("clean stop");

    let poller = Poller::start(watcher, Duration::from_secs(3600)).await;
    assert_eq!(poller.initial_report().notified_ids(Channel::Alerts).len(), 1);
    poller.stop().await.expect("clean stop");
}
