/*!
 * Wait Registry
 *
 * Maps each key to its in-flight [`WaitRecord`]. All lookups, inserts,
 * removals and join-count updates happen under a single mutex; blocking on a
 * record's release signal happens outside it.
 */

use super::config::JoinAccounting;
use super::signal::{ReleaseSignal, WakeResult};
use super::stats::WaitStats;
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-key wait state
#[derive(Debug, Default)]
pub struct WaitRecord {
    release: ReleaseSignal,
    /// Callers that found this record already registered. Written only while
    /// the registry lock is held.
    join_count: AtomicUsize,
}

impl WaitRecord {
    #[inline]
    pub fn join_count(&self) -> usize {
        self.join_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn release_signal(&self) -> &ReleaseSignal {
        &self.release
    }
}

/// Outcome of [`WaitRegistry::register`]
///
/// Holds the [`ReleaseHandle`] when the caller created the record, so
/// dropping a first registrant's registration releases the key.
#[derive(Debug)]
#[must_use = "dropping a first registrant's registration releases the key"]
pub struct Registration {
    is_joiner: bool,
    release: Option<ReleaseHandle>,
}

impl Registration {
    /// Whether the caller joined an existing record, per the registry's
    /// [`JoinAccounting`]
    #[inline]
    pub fn is_joiner(&self) -> bool {
        self.is_joiner
    }

    /// Whether the caller created the record
    #[inline]
    pub fn is_first(&self) -> bool {
        self.release.is_some()
    }

    pub fn release_handle(&self) -> Option<&ReleaseHandle> {
        self.release.as_ref()
    }

    pub fn into_release_handle(self) -> Option<ReleaseHandle> {
        self.release
    }
}

/// The first registrant's right to fire a record's release signal
///
/// Consuming [`release`](Self::release) fires exactly once. Dropping the
/// handle without releasing fires it too, so joiners never outlive a holder
/// that went away.
#[derive(Debug)]
pub struct ReleaseHandle {
    key: String,
    record: Arc<WaitRecord>,
    stats: Arc<WaitStats>,
    released: bool,
}

impl ReleaseHandle {
    fn new(key: String, record: Arc<WaitRecord>, stats: Arc<WaitStats>) -> Self {
        Self {
            key,
            record,
            stats,
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Callers that joined the record so far
    pub fn join_count(&self) -> usize {
        self.record.join_count()
    }

    /// Joiners currently blocked on the release signal
    pub fn waiter_count(&self) -> usize {
        self.record.release.waiter_count()
    }

    /// Fire the release signal, waking every joiner
    pub fn release(mut self) -> WakeResult {
        self.fire()
    }

    fn fire(&mut self) -> WakeResult {
        self.released = true;
        let result = self.record.release.fire();
        self.stats.record_release();
        debug!(
            key = %self.key,
            woken = result.count(),
            joins = self.record.join_count(),
            "Released wait record"
        );
        result
    }

    fn is_record(&self, record: &Arc<WaitRecord>) -> bool {
        Arc::ptr_eq(&self.record, record)
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        if !self.released {
            self.fire();
        }
    }
}

/// Key to in-flight wait record registry
///
/// Owned by the lock manager and shared with its coordinator by `Arc`.
/// The map allocates on first insert.
#[derive(Debug)]
pub struct WaitRegistry {
    entries: Mutex<HashMap<String, Arc<WaitRecord>, RandomState>>,
    accounting: JoinAccounting,
    stats: Arc<WaitStats>,
}

impl Default for WaitRegistry {
    fn default() -> Self {
        Self::new(JoinAccounting::default())
    }
}

impl WaitRegistry {
    pub fn new(accounting: JoinAccounting) -> Self {
        Self {
            entries: Mutex::new(HashMap::default()),
            accounting,
            stats: Arc::new(WaitStats::new()),
        }
    }

    /// Register a caller for `key`
    ///
    /// The first caller creates the record and returns immediately with its
    /// [`ReleaseHandle`]. Later callers bump the join count and block until
    /// the record's release signal fires.
    pub async fn register(&self, key: &str) -> Registration {
        let (record, joined) = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(record) => {
                    record.join_count.fetch_add(1, Ordering::AcqRel);
                    (Arc::clone(record), true)
                }
                None => {
                    let record = Arc::new(WaitRecord::default());
                    entries.insert(key.to_owned(), Arc::clone(&record));
                    (record, false)
                }
            }
        };

        if !joined {
            self.stats.record_first_registration();
            trace!(key, "Registered first wait record");

            let is_joiner = match self.accounting {
                JoinAccounting::Snapshot => false,
                // Read after unlocking: a joiner racing in here flips the bit
                JoinAccounting::ObservedAfterWake => record.join_count() > 0,
            };
            let handle = ReleaseHandle::new(key.to_owned(), record, Arc::clone(&self.stats));
            return Registration {
                is_joiner,
                release: Some(handle),
            };
        }

        self.stats.record_join();
        trace!(key, joins = record.join_count(), "Joined wait record");

        record.release.wait().await;

        let is_joiner = match self.accounting {
            JoinAccounting::Snapshot => true,
            JoinAccounting::ObservedAfterWake => record.join_count() > 0,
        };
        Registration {
            is_joiner,
            release: None,
        }
    }

    /// Remove the entry for `key`, whoever created it
    ///
    /// Returns whether an entry was present.
    pub fn cleanup(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        self.stats.record_cleanup();
        trace!(key, removed, "Cleaned up wait entry");
        removed
    }

    /// Settle a registration nobody is waiting for anymore
    ///
    /// A first registrant's entry is removed only if it still maps to its own
    /// record; its handle is then dropped, firing the release.
    pub(crate) fn abandon(&self, key: &str, registration: Registration) {
        self.stats.record_abandoned();

        if let Some(handle) = registration.release.as_ref() {
            let mut entries = self.entries.lock();
            if entries.get(key).is_some_and(|record| handle.is_record(record)) {
                entries.remove(key);
            }
        }

        debug!(
            key,
            first = registration.is_first(),
            "Discarded abandoned registration"
        );
    }

    /// Number of keys with an in-flight record
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Join count of the record currently registered for `key`
    pub fn join_count(&self, key: &str) -> Option<usize> {
        self.entries.lock().get(key).map(|record| record.join_count())
    }

    pub fn accounting(&self) -> JoinAccounting {
        self.accounting
    }

    pub fn stats(&self) -> &WaitStats {
        &self.stats
    }
}
