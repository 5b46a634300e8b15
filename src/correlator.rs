//! Latest-wins result mailbox.
//!
//! `ResultSlot` bridges engine completion threads (writers) and the render
//! loop (reader). It holds at most one value:
//!
//! - `deliver` replaces whatever is pending. Unread results are superseded,
//!   never queued.
//! - `take_latest` removes and returns the pending value, so a value is handed
//!   to the reader at most once.
//! - `close` marks the reader as gone. Later deliveries are absorbed and
//!   dropped, which is how completions that outlive the pipeline end up.
//!
//! Both operations run under one mutex, so a reader observes either nothing or
//! a complete value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What happened to a delivered value.
#[derive(Debug, PartialEq, Eq)]
pub enum DeliverOutcome<T> {
    /// Slot was empty; value is pending.
    Stored,
    /// Value is pending; the returned unread value was dropped from the slot.
    Superseded(T),
    /// Slot is closed; the returned value was not stored.
    Discarded(T),
}

/// Counters since the slot was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub delivered: u64,
    pub superseded: u64,
    pub taken: u64,
    pub discarded: u64,
}

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
    stats: SlotStats,
}

/// Shared single-slot mailbox. Clones are handles to the same slot.
pub struct ResultSlot<T> {
    inner: Arc<Mutex<SlotState<T>>>,
}

impl<T> Clone for ResultSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotState {
                value: None,
                closed: false,
                stats: SlotStats::default(),
            })),
        }
    }

    // The slot is only ever assigned whole values, so state left behind by a
    // panicking holder is still consistent.
    fn state(&self) -> MutexGuard<'_, SlotState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pending value.
    pub fn deliver(&self, value: T) -> DeliverOutcome<T> {
        let mut state = self.state();
        if state.closed {
            state.stats.discarded += 1;
            return DeliverOutcome::Discarded(value);
        }
        state.stats.delivered += 1;
        match state.value.replace(value) {
            Some(stale) => {
                state.stats.superseded += 1;
                DeliverOutcome::Superseded(stale)
            }
            None => DeliverOutcome::Stored,
        }
    }

    /// Remove and return the pending value, if any.
    pub fn take_latest(&self) -> Option<T> {
        let mut state = self.state();
        let value = state.value.take();
        if value.is_some() {
            state.stats.taken += 1;
        }
        value
    }

    /// Stop accepting values and drop anything pending.
    pub fn close(&self) {
        let stale = {
            let mut state = self.state();
            state.closed = true;
            state.value.take()
        };
        drop(stale);
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn has_pending(&self) -> bool {
        self.state().value.is_some()
    }

    pub fn stats(&self) -> SlotStats {
        self.state().stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
