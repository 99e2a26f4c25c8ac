use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use makrgate_auth_types::event::{SecurityEvent, SecurityEventKind, ThreatLevel};

/// Brute-force-eligible failures per origin per hour before escalation.
pub const BRUTE_FORCE_THRESHOLD: usize = 10;
/// Events of any kind per origin per hour before the origin is suspicious.
pub const SUSPICIOUS_IP_THRESHOLD: usize = 20;
/// Repetitions of one (kind, origin) pair before it counts as a pattern.
pub const PATTERN_THRESHOLD: u64 = 5;
/// Ring capacity of the per-origin event log.
const ORIGIN_LOG_CAPACITY: usize = 100;
/// Ring capacity of the per-user failure log.
const USER_LOG_CAPACITY: usize = 50;

/// Outcome of threat analysis: the (possibly reclassified) event kind
/// and the escalated level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub kind: SecurityEventKind,
    pub level: ThreatLevel,
}

/// Counter snapshot for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorStats {
    pub events_last_hour: usize,
    pub unique_origins_last_hour: usize,
    pub tracked_patterns: usize,
}

#[derive(Default)]
struct DetectorState {
    /// Interned origin strings; the index into `origins` is the compact
    /// origin id used by every other table.
    origins: Vec<String>,
    origin_ids: HashMap<String, usize>,
    /// Per-origin ring log of (timestamp, brute-force-eligible) entries.
    origin_events: Vec<VecDeque<(DateTime<Utc>, bool)>>,
    user_failures: HashMap<String, VecDeque<DateTime<Utc>>>,
    pattern_counts: HashMap<(SecurityEventKind, usize), u64>,
}

impl DetectorState {
    fn intern(&mut self, origin: &str) -> usize {
        if let Some(&id) = self.origin_ids.get(origin) {
            return id;
        }
        let id = self.origins.len();
        self.origins.push(origin.to_owned());
        self.origin_ids.insert(origin.to_owned(), id);
        self.origin_events
            .push(VecDeque::with_capacity(ORIGIN_LOG_CAPACITY));
        id
    }
}

/// Sliding-window abuse detector over per-origin and per-user counters.
///
/// One mutex guards all tables; every operation takes the lock once, so
/// recent-window reads always see a consistent snapshot.
#[derive(Default)]
pub struct ThreatDetector {
    state: Mutex<DetectorState>,
}

impl ThreatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().expect("threat detector lock poisoned")
    }

    /// Record `event` in the counters and compute its threat assessment.
    ///
    /// Level escalation is monotonic. The brute-force rule owns the
    /// kinds it watches; the pattern rule reclassifies the rest.
    pub fn analyze(&self, event: &SecurityEvent) -> Assessment {
        let mut state = self.locked();
        let now = event.timestamp;
        let origin_id = state.intern(&event.origin);
        let eligible = event.kind.is_brute_force_eligible();

        let log = &mut state.origin_events[origin_id];
        if log.len() == ORIGIN_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back((now, eligible));

        if let Some(user_id) = &event.user_id {
            let failures = state.user_failures.entry(user_id.clone()).or_default();
            if failures.len() == USER_LOG_CAPACITY {
                failures.pop_front();
            }
            failures.push_back(now);
        }

        let pattern_count = {
            let count = state
                .pattern_counts
                .entry((event.kind, origin_id))
                .or_insert(0);
            *count += 1;
            *count
        };

        let hour_ago = now - Duration::hours(1);
        let recent_total = state.origin_events[origin_id]
            .iter()
            .filter(|(t, _)| *t > hour_ago)
            .count();

        let mut kind = event.kind;
        let mut level = ThreatLevel::Low;

        if eligible && recent_total > BRUTE_FORCE_THRESHOLD {
            level = level.max(ThreatLevel::High);
            kind = SecurityEventKind::BruteForceAttempt;
        }
        if recent_total > SUSPICIOUS_IP_THRESHOLD {
            level = level.max(ThreatLevel::Medium);
        }
        if !eligible && pattern_count > PATTERN_THRESHOLD {
            level = level.max(ThreatLevel::Medium);
            kind = SecurityEventKind::SuspiciousPattern;
        }
        if event.kind.is_high_risk() {
            level = level.max(ThreatLevel::High);
        }

        Assessment { kind, level }
    }

    /// Whether `origin` has accumulated enough brute-force-eligible
    /// failures in the last hour to be blocked.
    pub fn should_block(&self, origin: &str, now: DateTime<Utc>) -> bool {
        let state = self.locked();
        let Some(&origin_id) = state.origin_ids.get(origin) else {
            return false;
        };
        let hour_ago = now - Duration::hours(1);
        state.origin_events[origin_id]
            .iter()
            .filter(|(t, eligible)| *t > hour_ago && *eligible)
            .count()
            > BRUTE_FORCE_THRESHOLD * 2
    }

    pub fn user_failure_count(&self, user_id: &str) -> usize {
        self.locked()
            .user_failures
            .get(user_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> DetectorStats {
        let state = self.locked();
        let hour_ago = now - Duration::hours(1);
        let events_last_hour = state
            .origin_events
            .iter()
            .flat_map(|log| log.iter())
            .filter(|(t, _)| *t > hour_ago)
            .count();
        let unique_origins_last_hour = state
            .origin_events
            .iter()
            .filter(|log| log.iter().any(|(t, _)| *t > hour_ago))
            .count();
        DetectorStats {
            events_last_hour,
            unique_origins_last_hour,
            tracked_patterns: state.pattern_counts.len(),
        }
    }
}
