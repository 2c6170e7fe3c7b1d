//! Watch/notify for conflict-set changes.
//!
//! Subscribers register with an optional slice filter; whenever the
//! coordinator publishes a new conflict snapshot, each subscriber whose
//! filtered view actually changed gets an update queued. Delivery is
//! monotone and duplicate-free: a snapshot identical to the last one
//! delivered to a subscriber is suppressed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::types::{FileConflict, SliceId};

/// A single conflict-set update delivered to a watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictUpdate {
    /// The full filtered conflict set at publish time.
    pub conflicts: Vec<FileConflict>,
}

struct Subscriber {
    filter: Option<SliceId>,
    last_delivered: Option<Vec<FileConflict>>,
    pending: Vec<ConflictUpdate>,
}

/// Manages conflict watch subscriptions and pending updates.
pub struct WatchManager {
    next_watch_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    /// Maximum queued updates per subscriber before dropping.
    max_pending: usize,
}

/// Restricts a conflict list to entries involving the given slice.
pub fn filter_conflicts(conflicts: &[FileConflict], filter: Option<&SliceId>) -> Vec<FileConflict> {
    match filter {
        None => conflicts.to_vec(),
        Some(slice) => conflicts
            .iter()
            .filter(|c| c.conflicting_slices.contains(slice))
            .cloned()
            .collect(),
    }
}

impl WatchManager {
    /// Creates a new manager with the given per-subscriber queue bound.
    pub fn new(max_pending: usize) -> Self {
        Self {
            next_watch_id: AtomicU64::new(1),
            subscribers: RwLock::new(HashMap::new()),
            max_pending,
        }
    }

    /// Registers a subscriber and returns its watch id.
    pub fn subscribe(&self, filter: Option<SliceId>) -> u64 {
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().expect("lock poisoned").insert(
            watch_id,
            Subscriber {
                filter,
                last_delivered: None,
                pending: Vec::new(),
            },
        );
        watch_id
    }

    /// Removes a subscriber, returns true if it existed.
    pub fn unsubscribe(&self, watch_id: u64) -> bool {
        self.subscribers
            .write()
            .expect("lock poisoned")
            .remove(&watch_id)
            .is_some()
    }

    /// Publishes a new conflict snapshot to every subscriber whose filtered
    /// view differs from the last update delivered to it.
    pub fn publish(&self, conflicts: &[FileConflict]) {
        let mut subscribers = self.subscribers.write().expect("lock poisoned");
        for sub in subscribers.values_mut() {
            let filtered = filter_conflicts(conflicts, sub.filter.as_ref());
            if sub.last_delivered.as_ref() == Some(&filtered) {
                continue;
            }
            if sub.pending.len() < self.max_pending {
                sub.pending.push(ConflictUpdate {
                    conflicts: filtered.clone(),
                });
            }
            sub.last_delivered = Some(filtered);
        }
    }

    /// Drains and returns all pending updates for a subscriber.
    pub fn drain(&self, watch_id: u64) -> Vec<ConflictUpdate> {
        let mut subscribers = self.subscribers.write().expect("lock poisoned");
        match subscribers.get_mut(&watch_id) {
            Some(sub) => std::mem::take(&mut sub.pending),
            None => Vec::new(),
        }
    }

    /// Returns the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("lock poisoned").len()
    }
}
