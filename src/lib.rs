//! Watches a company's active alerts and hardware incidents and raises a
//! single notification the first time each item becomes active.

pub mod api;
pub mod config;
pub mod error;
pub mod fields;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod poller;
pub mod sink;
pub mod slack;
pub mod state;
pub mod watcher;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ApiError, ConfigError, StorageError};
pub use notifier::{Detection, SeenSetNotifier};
pub use poller::{Poller, PollerError};
pub use sink::{LogSink, Notification, NotificationSink};
pub use slack::SlackSink;
pub use state::{FileStorage, MemoryStorage, ShownSet, Storage};
pub use watcher::{Channel, ChannelOutcome, ChannelStatus, ItemSource, PollReport, WatchedItem, Watcher};
