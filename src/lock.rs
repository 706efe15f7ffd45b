//! Post-reveal lock window.
//!
//! Modelled as a deadline on the session clock rather than a callback: the
//! owner polls it with the current time and it reports whole seconds left.
//! Cancelling drops the deadline, so a stale countdown can never outlive the
//! reveal that started it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub active: bool,
    pub remaining: u64,
}

#[derive(Debug)]
pub struct LockTimer {
    duration_secs: u64,
    started_ms: Option<u64>,
    last_reported: Option<u64>,
}

impl Default for LockTimer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl LockTimer {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            started_ms: None,
            last_reported: None,
        }
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Starts a fresh countdown at the full duration.
    pub fn start(&mut self, now_ms: u64) {
        self.started_ms = Some(now_ms);
        self.last_reported = Some(self.duration_secs);
    }

    pub fn cancel(&mut self) {
        self.started_ms = None;
        self.last_reported = None;
    }

    /// Remaining whole seconds. One second is taken off per elapsed second,
    /// clamped at zero.
    pub fn remaining(&self, now_ms: u64) -> u64 {
        match self.started_ms {
            Some(t0) => {
                let elapsed = now_ms.saturating_sub(t0) / 1000;
                self.duration_secs.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    pub fn status(&self, now_ms: u64) -> LockStatus {
        let remaining = self.remaining(now_ms);
        LockStatus {
            active: remaining > 0,
            remaining,
        }
    }

    pub fn is_active(&self, now_ms: u64) -> bool {
        self.remaining(now_ms) > 0
    }

    /// Returns the new remaining value when it changed since the last poll.
    /// Reaching zero drops the deadline.
    pub fn poll(&mut self, now_ms: u64) -> Option<u64> {
        self.started_ms?;
        let remaining = self.remaining(now_ms);
        if remaining == 0 {
            self.started_ms = None;
        }
        if self.last_reported == Some(remaining) {
            return None;
        }
        self.last_reported = Some(remaining);
        Some(remaining)
    }
}
