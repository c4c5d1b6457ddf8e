//! Wall-clock countdown timer for a single session step
//!
//! Remaining time is always recomputed from an absolute start instant, never by
//! counting ticks, so irregular polling or a suspended process does not drift.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Source of monotonic time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Countdown for one step.
///
/// At most one relationship with the clock is live: while paused the remaining
/// time is frozen in `paused_remaining_ms` and `started_at` is meaningless.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    clock: Arc<dyn Clock>,
    started_at: Instant,
    duration_ms: u64,
    total_ms: u64,
    paused_remaining_ms: Option<u64>,
    fired: bool,
}

impl SessionTimer {
    /// Create a timer and start it immediately
    pub fn start_new(clock: Arc<dyn Clock>, duration_ms: u64) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            started_at,
            duration_ms,
            total_ms: duration_ms,
            paused_remaining_ms: None,
            fired: false,
        }
    }

    /// Restart counting down `duration_ms` from now, clearing pause and expiry
    pub fn start(&mut self, duration_ms: u64) {
        self.started_at = self.clock.now();
        self.duration_ms = duration_ms;
        self.total_ms = duration_ms;
        self.paused_remaining_ms = None;
        self.fired = false;
    }

    pub fn pause(&mut self) {
        if self.paused_remaining_ms.is_some() {
            return;
        }
        self.paused_remaining_ms = Some(self.running_remaining_ms());
    }

    pub fn resume(&mut self) {
        if let Some(remaining) = self.paused_remaining_ms.take() {
            self.duration_ms = remaining;
            self.started_at = self.clock.now();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_remaining_ms.is_some()
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.paused_remaining_ms {
            Some(frozen) => frozen,
            None => self.running_remaining_ms(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms() == 0
    }

    /// Full length of the step this timer was started for
    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Completion notification: true exactly once, on the first poll that
    /// observes zero remaining time
    pub fn poll_expired(&mut self) -> bool {
        if self.fired || !self.is_expired() {
            return false;
        }
        self.fired = true;
        true
    }

    /// Whether completion has already been reported
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    fn running_remaining_ms(&self) -> u64 {
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(self.started_at)
            .as_millis() as u64;
        self.duration_ms.saturating_sub(elapsed)
    }
}
