//! Per-key single flight.
//!
//! At most one holder per key at a time. Slots are created lazily, reference
//! counted, and removed once the last holder or waiter is gone, so the map
//! only ever contains keys with work in progress.
//!
//! A holder can publish its outcome into the slot. Callers that queued
//! behind it while the slot was alive read that outcome instead of redoing
//! the work, which keeps fan-in cheap even when nothing else remembers the
//! result.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct Slot<T> {
    /// Outcome published by an earlier holder, if any.
    outcome: Arc<Mutex<Option<T>>>,
    /// Holders plus waiters. Only changed under the map's shard lock.
    holders: usize,
}

/// Keyed mutual exclusion for async pipelines, sharing each outcome with
/// the callers that waited for it.
pub struct SingleFlight<T> {
    slots: Arc<DashMap<String, Slot<T>>>,
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive use of `key`.
    ///
    /// The returned guard releases on drop, including when the future is
    /// cancelled before the lock is granted.
    pub async fn acquire(&self, key: &str) -> FlightGuard<T> {
        let outcome = {
            let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
                outcome: Arc::new(Mutex::new(None)),
                holders: 0,
            });
            slot.holders += 1;
            Arc::clone(&slot.outcome)
        };

        // Registered before awaiting so a cancelled waiter still decrements.
        let release = Release {
            slots: Arc::clone(&self.slots),
            key: key.to_string(),
        };

        let guard = outcome.lock_owned().await;
        FlightGuard {
            guard,
            _release: release,
        }
    }

    /// True if `key` currently has a holder or waiter.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys with a holder or waiter.
    pub fn in_flight_keys(&self) -> Vec<String> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.slots.len())
            .finish()
    }
}

/// Exclusive hold on one key.
///
/// Fields drop in declaration order: the mutex unlocks, then the slot count
/// is decremented.
pub struct FlightGuard<T> {
    guard: OwnedMutexGuard<Option<T>>,
    _release: Release<T>,
}

impl<T: Clone> FlightGuard<T> {
    /// Outcome left by a holder that finished while this caller waited.
    pub fn shared(&self) -> Option<T> {
        self.guard.clone()
    }

    /// Leave `outcome` for the callers queued behind this one.
    pub fn publish(&mut self, outcome: T) {
        *self.guard = Some(outcome);
    }
}

impl<T> fmt::Debug for FlightGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightGuard")
            .field("key", &self._release.key)
            .field("published", &self.guard.is_some())
            .finish()
    }
}

struct Release<T> {
    slots: Arc<DashMap<String, Slot<T>>>,
    key: String,
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.slots.entry(self.key.clone()) {
            let slot = entry.get_mut();
            slot.holders = slot.holders.saturating_sub(1);
            if slot.holders == 0 {
                entry.remove();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let flights = SingleFlight::<u32>::new();
        let guard = flights.acquire("a").await;
        assert!(flights.is_in_flight("a"));
        assert_eq!(flights.in_flight_keys(), vec!["a".to_string()]);
        drop(guard);
        assert!(flights.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_serialized() {
        let flights = SingleFlight::<u32>::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let flights = flights.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _guard = flights.acquire("same").await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_read_published_outcome() {
        let flights = SingleFlight::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let flights = flights.clone();
                let runs = Arc::clone(&runs);
                tokio::spawn(async move {
                    let mut guard = flights.acquire("k").await;
                    if let Some(value) = guard.shared() {
                        return value;
                    }
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    guard.publish(42);
                    42
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_does_not_outlive_slot() {
        let flights = SingleFlight::<u32>::new();
        let mut guard = flights.acquire("k").await;
        guard.publish(7);
        drop(guard);

        let next = flights.acquire("k").await;
        assert_eq!(next.shared(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_in_parallel() {
        let flights = SingleFlight::<u32>::new();
        let a = flights.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(1), flights.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(flights.len(), 2);
        drop(a);
        drop(b);
        assert!(flights.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_releases_its_slot_count() {
        let flights = SingleFlight::<u32>::new();
        let held = flights.acquire("k").await;

        let waited = tokio::time::timeout(Duration::from_secs(1), flights.acquire("k")).await;
        assert!(waited.is_err());
        assert!(flights.is_in_flight("k"));

        drop(held);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_holder_releases() {
        let flights = SingleFlight::<u32>::new();
        let inner = flights.clone();
        let result = tokio::spawn(async move {
            let _guard = inner.acquire("p").await;
            panic!("pipeline blew up");
        })
        .await;
        assert!(result.is_err());
        assert!(flights.is_empty());
        let _again = flights.acquire("p").await;
    }
}
