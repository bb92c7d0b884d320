//! New-item detection against a persisted set of already-notified ids.
//!
//! Each poll hands the notifier the ids that are active right now. An id is
//! reported the first time it shows up while absent from the shown set, and
//! never again until the history is cleared.

use crate::state::{ShownSet, Storage};
use std::collections::HashSet;
use std::sync::Arc;

/// Ids that deserve a notification for one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub new_ids: Vec<String>,
    pub first_load: bool,
}

pub struct SeenSetNotifier {
    storage: Arc<dyn Storage>,
    key: String,
    current: HashSet<String>,
    seen: HashSet<String>,
    shown: ShownSet,
    first_load: bool,
}

impl SeenSetNotifier {
    pub fn load(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let shown = ShownSet::load(storage.as_ref(), &key);
        tracing::debug!(key = %key, shown = shown.len(), "loaded shown ids");
        Self {
            storage,
            key,
            current: HashSet::new(),
            seen: HashSet::new(),
            shown,
            first_load: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Applies one successful poll and returns the ids to notify about, if any.
    pub fn observe<I, S>(&mut self, ids: I) -> Option<Detection>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut polled: Vec<String> = Vec::new();
        let mut active: HashSet<String> = HashSet::new();
        for id in ids {
            let id = id.into();
            if active.insert(id.clone()) {
                polled.push(id);
            }
        }

        // An empty poll is transient: first load stays pending and history is kept.
        if polled.is_empty() {
            self.current.clear();
            return None;
        }

        let new_ids: Vec<String> = polled
            .iter()
            .filter(|id| !self.shown.contains(id))
            .cloned()
            .collect();
        let first_load = self.first_load;

        let detection = if new_ids.is_empty() {
            None
        } else {
            self.mark_shown(&new_ids);
            Some(Detection {
                new_ids,
                first_load,
            })
        };

        self.seen.extend(active.iter().cloned());
        self.current = active;
        self.first_load = false;

        if let Some(detection) = &detection {
            tracing::info!(
                key = %self.key,
                first_load,
                ids = ?detection.new_ids,
                "new items detected"
            );
        }
        detection
    }

    /// Forgets every id, including the persisted ones, so the next poll
    /// reports everything active as new.
    pub fn clear_history(&mut self) {
        self.current.clear();
        self.seen.clear();
        self.shown.clear();
        if let Err(error) = self.storage.remove(&self.key) {
            tracing::warn!(key = %self.key, %error, "failed to clear persisted shown ids");
        }
        tracing::info!(key = %self.key, "notification history cleared");
    }

    pub fn current_ids(&self) -> &HashSet<String> {
        &self.current
    }

    pub fn seen_ids(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn shown_ids(&self) -> &HashSet<String> {
        self.shown.ids()
    }

    pub fn is_first_load(&self) -> bool {
        self.first_load
    }

    fn mark_shown(&mut self, ids: &[String]) {
        for id in ids {
            self.shown.mark_shown(id);
        }
        if let Err(error) = self.shown.save(self.storage.as_ref(), &self.key) {
            tracing::warn!(key = %self.key, %error, "failed to persist shown ids");
        }
    }
}
