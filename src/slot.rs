//! Single-capacity "latest value" buffer between one producer and the consumer.
//!
//! `LatestSlot` holds at most one pending value:
//! - `publish` never blocks; it overwrites whatever is pending
//! - `take_blocking` parks until a value arrives, then empties the slot
//! - `try_take` returns immediately, empty or not
//!
//! Capacity is 1 by construction. There is no constructor that accepts a
//! capacity, so a deeper queue cannot be configured by accident.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::shutdown::ShutdownSignal;

/// How often a blocking take re-checks the shutdown signal.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    // The guarded Option is never left half-written, so a poisoned lock
    // still holds a usable value.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value`, discarding any pending one.
    ///
    /// Returns `true` when a pending value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let overwritten = {
            let mut guard = self.lock();
            guard.replace(value).is_some()
        };
        self.ready.notify_one();
        overwritten
    }

    /// Block until a value is available, then remove and return it.
    pub fn take_blocking(&self) -> T {
        let mut guard = self.lock();
        loop {
            if let Some(value) = guard.take() {
                return value;
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait at most `timeout` for a value.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |value| value.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Block until a value is available or `shutdown` is set.
    ///
    /// Returns `None` once the signal is observed, even if a value is pending.
    pub fn take_until(&self, shutdown: &ShutdownSignal) -> Option<T> {
        loop {
            if shutdown.is_set() {
                return None;
            }
            if let Some(value) = self.take_timeout(SHUTDOWN_POLL_INTERVAL) {
                return Some(value);
            }
        }
    }

    /// Remove and return the pending value, if any. Never blocks on a producer.
    pub fn try_take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::StopReason;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn last_publish_wins() {
        let slot = LatestSlot::new();
        assert!(!slot.publish(1));
        assert!(slot.publish(2));
        assert_eq!(slot.take_blocking(), 2);
        assert!(slot.is_empty());
    }

    #[test]
    fn only_last_of_many_publishes_is_observed() {
        let slot = LatestSlot::new();
        for i in 0..1000 {
            slot.publish(i);
        }
        assert_eq!(slot.try_take(), Some(999));
        assert_eq!(slot.try_take(), None);
    }

    #[test]
    fn try_take_on_empty_returns_immediately() {
        let slot: LatestSlot<u64> = LatestSlot::new();
        let start = Instant::now();
        assert_eq!(slot.try_take(), None);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn try_take_empties_slot() {
        let slot = LatestSlot::new();
        slot.publish("a");
        assert_eq!(slot.try_take(), Some("a"));
        assert!(slot.is_empty());
    }

    #[test]
    fn take_blocking_waits_for_next_publish() {
        let slot = Arc::new(LatestSlot::new());
        slot.publish(1);
        assert_eq!(slot.take_blocking(), 1);

        let producer = slot.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.publish(2);
        });

        // The consumed value is never handed out again.
        assert_eq!(slot.take_blocking(), 2);
        handle.join().unwrap();
    }

    #[test]
    fn take_timeout_expires_on_empty_slot() {
        let slot: LatestSlot<u8> = LatestSlot::new();
        let start = Instant::now();
        assert_eq!(slot.take_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn take_until_returns_none_after_shutdown() {
        let slot: Arc<LatestSlot<u8>> = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();

        let stopper = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stopper.set(StopReason::Interrupted);
        });

        let start = Instant::now();
        assert_eq!(slot.take_until(&shutdown), None);
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn take_until_returns_published_value() {
        let slot = LatestSlot::new();
        let shutdown = ShutdownSignal::new();
        slot.publish(7u32);
        assert_eq!(slot.take_until(&shutdown), Some(7));
    }

    #[test]
    fn concurrent_publishers_never_corrupt_value() {
        let slot = Arc::new(LatestSlot::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let slot = slot.clone();
                thread::spawn(move || {
                    for i in 0..1000u64 {
                        slot.publish((t, i));
                    }
                })
            })
            .collect();

        let mut taken = 0;
        while taken < 100 {
            if let Some((t, i)) = slot.try_take() {
                assert!(t < 4 && i < 1000);
                taken += 1;
            }
            if handles.iter().all(|h| h.is_finished()) {
                break;
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }
        // After all publishers finish, the slot holds one complete value at most.
        if let Some((t, i)) = slot.try_take() {
            assert!(t < 4);
            assert_eq!(i, 999);
        }
    }
}
