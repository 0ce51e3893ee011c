// Service for rate-limiting notifications per (subject, issue) slot.

use crate::core::IssueKind;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

/// Number of lock-sharded buckets. Keys on different shards never contend.
const SHARD_COUNT: usize = 16;

/// Composite identity of one throttle slot. A typed key, rather than a
/// concatenated string, so separator characters inside subject identifiers
/// cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub subject: String,
    pub issue: IssueKind,
}

/// Tracks, per (subject, issue) pair, the timestamp of the last delivered
/// notification, and answers whether a new one is allowed now.
///
/// Entries are created lazily on the first recorded emission and never expire
/// on their own; hosts must call [`ThrottleLedger::clear`] when a subject's
/// session ends to bound memory.
pub struct ThrottleLedger {
    window_secs: f64,
    shards: Vec<Mutex<HashMap<ThrottleKey, f64>>>,
}

impl ThrottleLedger {
    /// Creates a ledger with the given minimum interval between deliveries
    /// for the same slot.
    pub fn new(window: Duration) -> Self {
        Self {
            window_secs: window.as_secs_f64(),
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Returns true if no emission was recorded for this slot, or the last
    /// one is at least a full window old. Read-only.
    ///
    /// A `now` earlier than the stored timestamp (clock skew, reordered
    /// events) denies admission rather than erroring: the elapsed duration
    /// is simply not yet a full window.
    pub fn is_allowed(&self, subject: &str, issue: IssueKind, now: f64) -> bool {
        let key = ThrottleKey {
            subject: subject.to_string(),
            issue,
        };
        let shard = self.shard(&key).lock().expect("throttle shard poisoned");
        match shard.get(&key) {
            None => true,
            Some(&last) => now - last >= self.window_secs,
        }
    }

    /// Unconditionally stamps the slot with `now`. Callers are expected to
    /// have consulted [`ThrottleLedger::is_allowed`] first; the ledger does
    /// not enforce the check itself.
    pub fn record_emission(&self, subject: &str, issue: IssueKind, now: f64) {
        let key = ThrottleKey {
            subject: subject.to_string(),
            issue,
        };
        self.shard(&key)
            .lock()
            .expect("throttle shard poisoned")
            .insert(key, now);
        metrics::gauge!("throttle_ledger_entries").set(self.len() as f64);
    }

    /// Removes every slot belonging to `subject`, leaving other subjects'
    /// throttle state untouched. Called on subject disconnect.
    pub fn clear(&self, subject: &str) {
        for shard in &self.shards {
            shard
                .lock()
                .expect("throttle shard poisoned")
                .retain(|key, _| key.subject != subject);
        }
        metrics::gauge!("throttle_ledger_entries").set(self.len() as f64);
    }

    /// Empties the ledger entirely; every subsequent `is_allowed` call
    /// returns true regardless of prior history.
    pub fn clear_all(&self) {
        for shard in &self.shards {
            shard.lock().expect("throttle shard poisoned").clear();
        }
        metrics::gauge!("throttle_ledger_entries").set(0.0);
    }

    /// Total number of live throttle slots.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("throttle shard poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, key: &ThrottleKey) -> &Mutex<HashMap<ThrottleKey, f64>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }
}

impl Default for ThrottleLedger {
    /// The default minimum interval between two delivered notifications for
    /// the same (subject, issue) slot is 60 seconds.
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
