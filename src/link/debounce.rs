//! Connect/disconnect storm suppression.
//!
//! The radio stack can report a connect immediately followed by a
//! disconnect (or the reverse) for the same physical link.  Only the
//! first event inside each window is allowed to change state.

use crate::config::{Millis, CONNECTION_DEBOUNCE_MS};

/// Fixed-window debouncer for link lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionDebouncer {
    last_connection_change: Millis,
    window: Millis,
}

impl ConnectionDebouncer {
    pub const fn new() -> Self {
        Self::with_window(CONNECTION_DEBOUNCE_MS)
    }

    pub const fn with_window(window: Millis) -> Self {
        Self {
            last_connection_change: 0,
            window,
        }
    }

    /// Whether an event stamped `now` should be processed.
    ///
    /// Pure predicate; call [`record`](Self::record) once the event has
    /// actually been applied.  A timestamp older than the last accepted
    /// change counts as inside the window.
    pub fn accept(&self, now: Millis) -> bool {
        now.saturating_sub(self.last_connection_change) >= self.window
            && now >= self.last_connection_change
    }

    /// Mark `now` as the time of the last accepted change.
    pub fn record(&mut self, now: Millis) {
        self.last_connection_change = now;
    }

    pub fn last_connection_change(&self) -> Millis {
        self.last_connection_change
    }
}

impl Default for ConnectionDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
