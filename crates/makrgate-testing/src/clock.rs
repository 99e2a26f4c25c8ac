use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use makrgate_core::clock::Clock;

/// Manually advanced clock for window and expiry tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Start at the current wall-clock time. Useful when tokens are
    /// crafted relative to real time but windows are driven manually.
    pub fn start_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
