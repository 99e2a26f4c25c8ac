use chrono::{DateTime, Utc};

/// Injected time source.
///
/// Everything that reasons about windows or expiry (threat counters,
/// block lists, token age checks) takes an `Arc<dyn Clock>` so tests can
/// drive time manually instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
