//! Save debouncing
//!
//! Rapid successive edits coalesce into one save: every edit pushes the
//! deadline back, and the save becomes due once the quiet period passes.
//! Time is passed in by the caller so the debouncer needs no threads.

use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Note an edit at `now`, resetting any pending deadline
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
        trace!("Save rescheduled in {:?}", self.delay);
    }

    /// True if a save is scheduled and its quiet period has elapsed
    pub fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Consume a due save
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
