use std::sync::atomic::{AtomicI64, Ordering};
use chrono::Utc;
use modguard_common::traits::Clock;

/// Wall clock, Unix milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        current_epoch_ms()
    }
}

/// Clock that only moves when told to. Handy for tests and replaying logs.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self { now: AtomicI64::new(start_ms) }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Moves the clock forward and returns the new reading.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Returns the current epoch milliseconds.
pub fn current_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
