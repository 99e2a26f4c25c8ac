use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use makrgate_auth_types::event::{
    SecurityEvent, SecurityEventKind, ThreatLevel, truncate_user_agent,
};
use makrgate_core::clock::Clock;
use makrgate_core::envelope::RequestContext;

use super::blocklist::BlockList;
use super::threat::ThreatDetector;

/// How long an abusive origin stays blocked.
const BLOCK_HOURS: i64 = 1;

/// Security statistics snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStats {
    pub timestamp: DateTime<Utc>,
    pub blocked_origins: usize,
    pub events_last_hour: usize,
    pub unique_origins_last_hour: usize,
    pub tracked_patterns: usize,
}

/// The security pipeline behind every authentication failure: threat
/// analysis, block-list maintenance, and structured event logging.
///
/// Constructed once at startup and shared through application state;
/// restart clears all counters and blocks, which is acceptable for
/// single-process deployments.
pub struct SecurityMonitor {
    detector: ThreatDetector,
    blocklist: BlockList,
    clock: Arc<dyn Clock>,
}

impl SecurityMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            detector: ThreatDetector::new(),
            blocklist: BlockList::new(),
            clock,
        }
    }

    /// Record one security-relevant failure.
    ///
    /// Runs threat analysis (which may reclassify the kind and escalate
    /// the level), blocks the origin once its recent failures warrant
    /// it, and emits exactly one structured log record for the event —
    /// plus an alert record for HIGH and CRITICAL levels.
    pub fn record(
        &self,
        kind: SecurityEventKind,
        ctx: &RequestContext,
        user_agent: &str,
        user_id: Option<String>,
        token_jti: Option<String>,
        details: Option<Map<String, Value>>,
    ) -> SecurityEvent {
        let now = self.clock.now();
        let mut event = SecurityEvent {
            timestamp: now,
            kind,
            origin: ctx.origin.clone(),
            user_agent: truncate_user_agent(user_agent),
            request_id: ctx.request_id.clone(),
            user_id,
            token_jti,
            details,
            level: ThreatLevel::Low,
        };

        let assessment = self.detector.analyze(&event);
        event.kind = assessment.kind;
        event.level = assessment.level;

        if self.detector.should_block(&event.origin, now) {
            self.block_origin(&event, now);
        }

        self.emit(&event);
        event
    }

    /// Whether requests from `origin` are currently denied.
    pub fn is_blocked(&self, origin: &str) -> bool {
        self.blocklist.is_blocked(origin, self.clock.now())
    }

    pub fn stats(&self) -> SecurityStats {
        let now = self.clock.now();
        let detector = self.detector.stats(now);
        SecurityStats {
            timestamp: now,
            blocked_origins: self.blocklist.len(),
            events_last_hour: detector.events_last_hour,
            unique_origins_last_hour: detector.unique_origins_last_hour,
            tracked_patterns: detector.tracked_patterns,
        }
    }

    pub fn detector(&self) -> &ThreatDetector {
        &self.detector
    }

    fn block_origin(&self, cause: &SecurityEvent, now: DateTime<Utc>) {
        let until = self
            .blocklist
            .insert(&cause.origin, Duration::hours(BLOCK_HOURS), now);

        let mut details = Map::new();
        details.insert("reason".to_owned(), json!("excessive_jwt_errors"));
        details.insert(
            "block_until".to_owned(),
            json!(until.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        let block_event = SecurityEvent {
            timestamp: now,
            kind: cause.kind,
            origin: cause.origin.clone(),
            user_agent: cause.user_agent.clone(),
            request_id: cause.request_id.clone(),
            user_id: cause.user_id.clone(),
            token_jti: cause.token_jti.clone(),
            details: Some(details),
            level: cause.level.max(ThreatLevel::High),
        };
        self.emit(&block_event);
    }

    fn emit(&self, event: &SecurityEvent) {
        let payload = event.to_log_value();
        // tracing has no level above error; CRITICAL is distinguished by
        // the threat_level field.
        match event.level {
            ThreatLevel::Critical | ThreatLevel::High => {
                error!(event = "jwt_security", threat_level = event.level.as_str(), payload = %payload, "jwt security event");
            }
            ThreatLevel::Medium => {
                warn!(event = "jwt_security", threat_level = event.level.as_str(), payload = %payload, "jwt security event");
            }
            ThreatLevel::Low => {
                info!(event = "jwt_security", threat_level = event.level.as_str(), payload = %payload, "jwt security event");
            }
        }
        if event.level >= ThreatLevel::High {
            error!(event = "jwt_security", alert = true, severity = event.level.as_str(), payload = %payload, "jwt security alert");
        }
    }
}
