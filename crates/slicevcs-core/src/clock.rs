//! Monotonic time source and unique id generation.
//!
//! Commit, changeset, and global commit ids all take the shape
//! `<prefix>-<nanoseconds>`. Uniqueness under burst submission is guaranteed
//! by never handing out the same nanosecond reading twice: each reading is
//! the wall clock advanced past the previous reading if necessary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{SliceId, Timestamp};

/// Monotonic clock and id generator shared by the coordinator.
pub struct IdClock {
    last_nanos: AtomicU64,
}

impl IdClock {
    /// Creates a new clock starting from the current wall time.
    pub fn new() -> Self {
        Self {
            last_nanos: AtomicU64::new(0),
        }
    }

    fn wall_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before epoch")
            .as_nanos() as u64
    }

    /// Returns a strictly increasing nanoseconds-since-epoch reading.
    pub fn next_nanos(&self) -> u64 {
        loop {
            let wall = Self::wall_nanos();
            let last = self.last_nanos.load(Ordering::SeqCst);
            let next = wall.max(last + 1);
            if self
                .last_nanos
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Returns the current time; consecutive readings never decrease.
    pub fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.next_nanos())
    }

    /// Mints a fresh commit id.
    pub fn commit_id(&self) -> String {
        format!("commit-{}", self.next_nanos())
    }

    /// Mints a fresh changeset id.
    pub fn changeset_id(&self) -> String {
        format!("cs-{}", self.next_nanos())
    }

    /// Mints a fresh changeset content hash.
    pub fn changeset_hash(&self) -> String {
        format!("hash-{}", self.next_nanos())
    }

    /// Mints a fresh base commit id for a rebased changeset.
    pub fn rebase_base(&self) -> String {
        format!("base-{}", self.next_nanos())
    }

    /// Mints the post-promotion head commit id for a merged slice.
    pub fn merged_commit_id(&self, slice_id: &SliceId) -> String {
        format!("merged-{}-{}", slice_id, self.next_nanos())
    }

    /// Mints a global commit hash together with its timestamp.
    ///
    /// Both are derived from the same reading so the recorded history entry
    /// and the hash embed the same instant.
    pub fn global_commit(&self) -> (String, Timestamp) {
        let nanos = self.next_nanos();
        (format!("global-{nanos}"), Timestamp::from_nanos(nanos))
    }
}

impl Default for IdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_next_nanos_strictly_increasing() {
        let clock = IdClock::new();
        let mut last = 0;
        for _ in 0..1000 {
            let n = clock.next_nanos();
            assert!(n > last);
            last = n;
        }
    }

    #[test]
    fn test_now_non_decreasing() {
        let clock = IdClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b > a);
    }

    #[test]
    fn test_id_shapes() {
        let clock = IdClock::new();
        assert!(clock.commit_id().starts_with("commit-"));
        assert!(clock.changeset_id().starts_with("cs-"));
        assert!(clock.changeset_hash().starts_with("hash-"));
        assert!(clock.rebase_base().starts_with("base-"));
        assert!(clock
            .merged_commit_id(&SliceId::new("team-a"))
            .starts_with("merged-team-a-"));
        let (hash, ts) = clock.global_commit();
        assert!(hash.starts_with("global-"));
        assert_eq!(hash, format!("global-{}", ts.as_nanos()));
    }

    #[test]
    fn test_ids_unique_under_burst() {
        let clock = Arc::new(IdClock::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let clock = clock.clone();
            handles.push(std::thread::spawn(move || {
                (0..500).map(|_| clock.commit_id()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
