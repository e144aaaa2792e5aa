// SPDX-License-Identifier: GPL-3.0-only

//! Keep-only-latest handoff between a frame source and a single consumer
//!
//! The slot holds at most one pending item. Offering while an item is still
//! pending replaces it, so a slow consumer always picks up the newest frame
//! and never builds a backlog. Items already taken by the consumer are never
//! touched again.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Result of offering an item to the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Slot was empty; item is now pending
    Accepted,
    /// A pending item was discarded in favor of this one
    Replaced,
    /// Slot is closed; item was ignored
    Closed,
}

/// Result of waiting for an item
#[derive(Debug)]
pub enum TakeOutcome<T> {
    /// The pending item, now owned by the consumer
    Item(T),
    /// Nothing arrived before the timeout
    Empty,
    /// Slot is closed; no further items will arrive
    Closed,
}

struct SlotState<T> {
    pending: Option<T>,
    closed: bool,
}

/// Capacity-1 slot with replace-on-offer semantics
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    // A panic while holding the lock cannot leave SlotState inconsistent
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Offer an item, replacing any pending one
    pub fn offer(&self, item: T) -> OfferOutcome {
        let mut state = self.lock();
        if state.closed {
            return OfferOutcome::Closed;
        }
        let replaced = state.pending.replace(item).is_some();
        drop(state);
        self.ready.notify_one();

        if replaced {
            OfferOutcome::Replaced
        } else {
            OfferOutcome::Accepted
        }
    }

    /// Wait up to `timeout` for a pending item
    pub fn take_timeout(&self, timeout: Duration) -> TakeOutcome<T> {
        let state = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.pending.is_none() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());

        if state.closed {
            return TakeOutcome::Closed;
        }
        match state.pending.take() {
            Some(item) => TakeOutcome::Item(item),
            None => TakeOutcome::Empty,
        }
    }

    /// Close the slot, discarding any pending item and waking the consumer
    ///
    /// Returns true if this call closed the slot.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let was_open = !state.closed;
        state.closed = true;
        state.pending = None;
        drop(state);
        self.ready.notify_all();
        was_open
    }

    /// Reopen a closed slot so it accepts items again
    pub fn reopen(&self) {
        let mut state = self.lock();
        state.closed = false;
        state.pending = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_offer_replaces_pending() {
        let slot = LatestSlot::new();
        assert_eq!(slot.offer(1), OfferOutcome::Accepted);
        assert_eq!(slot.offer(2), OfferOutcome::Replaced);
        assert_eq!(slot.offer(3), OfferOutcome::Replaced);

        match slot.take_timeout(Duration::from_millis(1)) {
            TakeOutcome::Item(v) => assert_eq!(v, 3),
            other => panic!("Expected item, got {:?}", other),
        }
        assert!(matches!(
            slot.take_timeout(Duration::from_millis(1)),
            TakeOutcome::Empty
        ));
    }

    #[test]
    fn test_close_discards_and_ignores() {
        let slot = LatestSlot::new();
        slot.offer(1);
        assert!(slot.close());
        assert!(!slot.close());
        assert!(!slot.has_pending());
        assert_eq!(slot.offer(2), OfferOutcome::Closed);
        assert!(matches!(
            slot.take_timeout(Duration::from_millis(1)),
            TakeOutcome::Closed
        ));

        slot.reopen();
        assert_eq!(slot.offer(3), OfferOutcome::Accepted);
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let slot: Arc<LatestSlot<u32>> = Arc::new(LatestSlot::new());
        let consumer_slot = Arc::clone(&slot);

        let consumer = thread::spawn(move || consumer_slot.take_timeout(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        slot.close();

        assert!(matches!(consumer.join().unwrap(), TakeOutcome::Closed));
    }
}
