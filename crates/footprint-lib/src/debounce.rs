//! Time-window coalescing
//!
//! Used for the search box (refetch only after typing pauses) and for map movement
//! (report an extent only once it stopped changing). Time is passed in explicitly
//! so callers drive it from their frame clock and tests need no sleeping.

use instant::Instant;
use std::time::Duration;

/// Holds the latest value until it has been quiet for `window`
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounced<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the value once the quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.duration_since(*at) >= self.window);
        if ready {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    /// Time left before [`Debounced::poll`] would fire, for scheduling a repaint
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, at)| self.window.saturating_sub(now.duration_since(*at)))
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Latest pushed value, if not yet delivered
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl<T: PartialEq> Debounced<T> {
    /// Push only if the value differs from the pending one
    ///
    /// Returns true when the quiet period was restarted.
    pub fn push_if_changed(&mut self, value: T, now: Instant) -> bool {
        if self.peek() == Some(&value) {
            return false;
        }
        self.push(value, now);
        true
    }
}
