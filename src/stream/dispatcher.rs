//! Update throttling.
//!
//! [`UpdateDispatcher`] is a two-state timer (idle / pending) that decides
//! when the accumulator may be pushed to the store and UI. It never sleeps
//! and never reads the clock; callers pass `now` in and drive the pending
//! deadline themselves.
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// What the caller should do after reporting an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    /// Flush now, then call [`UpdateDispatcher::mark_flushed`].
    FlushNow,
    /// A flush was scheduled for this deadline.
    Scheduled(Instant),
    /// A flush is already pending; it will carry this update too.
    Pending(Instant),
    /// No deadline is representable; the update waits for the final flush.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    interval: Duration,
    last_flush: Option<Instant>,
    pending: Option<Instant>,
    dirty: bool,
    flush_count: u64,
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl UpdateDispatcher {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
            pending: None,
            dirty: false,
            flush_count: 0,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Report that the accumulator changed at `now`.
    pub fn on_update(&mut self, now: Instant) -> DispatchAction {
        self.dirty = true;
        if let Some(deadline) = self.pending {
            return DispatchAction::Pending(deadline);
        }
        let Some(last) = self.last_flush else {
            return DispatchAction::FlushNow;
        };
        if now.saturating_duration_since(last) >= self.interval {
            return DispatchAction::FlushNow;
        }
        // An interval past the clock's range means "never again before the end".
        match last.checked_add(self.interval) {
            Some(deadline) => {
                self.pending = Some(deadline);
                DispatchAction::Scheduled(deadline)
            }
            None => DispatchAction::Deferred,
        }
    }

    /// Deadline of the pending flush, if one is scheduled.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending.is_some_and(|deadline| now >= deadline)
    }

    /// Record a completed flush. Clears any pending deadline.
    pub fn mark_flushed(&mut self, now: Instant) {
        self.last_flush = Some(now);
        self.pending = None;
        self.dirty = false;
        self.flush_count += 1;
    }

    /// True when updates arrived since the last flush.
    #[must_use]
    pub fn needs_final_flush(&self) -> bool {
        self.dirty || self.pending.is_some()
    }

    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }
}
