//! Security events emitted for every authentication failure.

use chrono::{DateTime, SecondsFormat, Utc};
use http::StatusCode;
use serde_json::{Map, Value, json};

/// Stored user-agent bound; longer values are truncated.
pub const MAX_USER_AGENT_LEN: usize = 100;

/// Ordered severity of a security event. Escalation only ever raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Closed set of security event kinds. The string forms are stable: they
/// appear in log records and in the `code` field of error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityEventKind {
    // Token structure
    MalformedToken,
    InvalidHeader,
    MissingClaims,
    // Cryptographic / semantic validation
    ExpiredToken,
    InvalidSignature,
    InvalidIssuer,
    InvalidAudience,
    InvalidAlgorithm,
    // Timing
    TokenNotYetValid,
    TokenTooOld,
    InvalidIssuedAt,
    // Authentication
    MissingToken,
    InvalidTokenType,
    RevokedToken,
    // Authorization
    InsufficientPrivileges,
    ScopeMismatch,
    TenantMismatch,
    // Key infrastructure
    JwksFetchError,
    KeyNotFound,
    NetworkError,
    // Attack indicators
    ReplayAttack,
    BruteForceAttempt,
    SuspiciousPattern,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::InvalidHeader => "INVALID_HEADER",
            Self::MissingClaims => "MISSING_CLAIMS",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidIssuer => "INVALID_ISSUER",
            Self::InvalidAudience => "INVALID_AUDIENCE",
            Self::InvalidAlgorithm => "INVALID_ALGORITHM",
            Self::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            Self::TokenTooOld => "TOKEN_TOO_OLD",
            Self::InvalidIssuedAt => "INVALID_ISSUED_AT",
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::RevokedToken => "REVOKED_TOKEN",
            Self::InsufficientPrivileges => "INSUFFICIENT_PRIVILEGES",
            Self::ScopeMismatch => "SCOPE_MISMATCH",
            Self::TenantMismatch => "TENANT_MISMATCH",
            Self::JwksFetchError => "JWKS_FETCH_ERROR",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ReplayAttack => "REPLAY_ATTACK",
            Self::BruteForceAttempt => "BRUTE_FORCE_ATTEMPT",
            Self::SuspiciousPattern => "SUSPICIOUS_PATTERN",
        }
    }

    /// HTTP status for responses classified with this kind.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::JwksFetchError | Self::NetworkError => StatusCode::SERVICE_UNAVAILABLE,
            Self::InsufficientPrivileges | Self::ScopeMismatch | Self::TenantMismatch => {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Generic user-visible message. The precise classification is
    /// carried only in the `code` field and in logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Authentication required",
            Self::MalformedToken
            | Self::InvalidHeader
            | Self::InvalidSignature
            | Self::InvalidIssuer
            | Self::InvalidAudience
            | Self::InvalidAlgorithm => "Invalid authentication token",
            Self::ExpiredToken => "Authentication token has expired",
            Self::TokenNotYetValid => "Authentication token not yet valid",
            Self::InvalidTokenType => "Invalid authentication token type",
            Self::RevokedToken => "Authentication token has been revoked",
            Self::InsufficientPrivileges => "Insufficient privileges",
            Self::ScopeMismatch | Self::TenantMismatch => "Access denied",
            Self::JwksFetchError | Self::NetworkError => "Authentication service unavailable",
            _ => "Authentication failed",
        }
    }

    /// Kinds that feed the brute-force detector.
    pub fn is_brute_force_eligible(&self) -> bool {
        matches!(self, Self::ExpiredToken | Self::InvalidSignature)
    }

    /// Kinds whose single occurrence is already high threat.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::InvalidAlgorithm)
    }
}

/// Truncate a user-agent string to the stored bound.
pub fn truncate_user_agent(user_agent: &str) -> String {
    user_agent.chars().take(MAX_USER_AGENT_LEN).collect()
}

/// One security-relevant occurrence. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SecurityEventKind,
    pub origin: String,
    pub user_agent: String,
    pub request_id: String,
    pub user_id: Option<String>,
    pub token_jti: Option<String>,
    pub details: Option<Map<String, Value>>,
    pub level: ThreatLevel,
}

impl SecurityEvent {
    /// Structured rendering for the log sink.
    pub fn to_log_value(&self) -> Value {
        let mut log = json!({
            "event_type": self.kind.as_str(),
            "threat_level": self.level.as_str(),
            "origin": self.origin,
            "user_agent": self.user_agent,
            "request_id": self.request_id,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Some(user_id) = &self.user_id {
            log["user_id"] = json!(user_id);
        }
        if let Some(token_jti) = &self.token_jti {
            log["token_jti"] = json!(token_jti);
        }
        if let Some(details) = &self.details {
            log["details"] = Value::Object(details.clone());
        }
        log
    }
}
