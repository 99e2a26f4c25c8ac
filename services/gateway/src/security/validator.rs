use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode};
use serde_json::{Map, Value, json};

use makrgate_auth_types::claims::JwtClaims;
use makrgate_auth_types::event::SecurityEventKind;
use makrgate_auth_types::peek;
use makrgate_core::clock::Clock;

use super::keys::KeyProvider;

/// Signature algorithms the identity provider is trusted to use.
/// Anything else is treated as a downgrade attempt.
const ALLOWED_ALGORITHMS: &[&str] = &["RS256"];
/// Clock-skew tolerance applied to `exp` and `nbf`.
const LEEWAY_SECONDS: u64 = 30;
/// Tokens issued longer ago than this are rejected regardless of `exp`.
const MAX_TOKEN_AGE_HOURS: i64 = 24;
/// Lifetimes below this trigger a warning, not a rejection.
const MIN_TOKEN_LIFETIME_SECONDS: i64 = 300;
/// Subjects shorter than this look wrong and are logged.
const MIN_SUBJECT_LEN: usize = 8;
/// Claims every access token must carry.
const REQUIRED_CLAIMS: &[&str] = &["sub", "iat", "exp", "iss", "aud"];

/// A classified token-validation failure, ready for threat analysis.
///
/// `user_id` and `token_jti` are recovered from the unverified payload
/// when possible so failures can be correlated in the security log.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub kind: SecurityEventKind,
    pub details: Option<Map<String, Value>>,
    pub user_id: Option<String>,
    pub token_jti: Option<String>,
}

impl ValidationFailure {
    pub fn new(kind: SecurityEventKind) -> Self {
        Self {
            kind,
            details: None,
            user_id: None,
            token_jti: None,
        }
    }

    fn detail(mut self, key: &str, value: Value) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_owned(), value);
        self
    }

    fn identity_from(mut self, claims: &Map<String, Value>) -> Self {
        self.user_id = claims.get("sub").and_then(Value::as_str).map(str::to_owned);
        self.token_jti = claims.get("jti").and_then(Value::as_str).map(str::to_owned);
        self
    }
}

/// Verifies bearer tokens against the injected key provider and
/// produces validated claims or a classified failure.
pub struct JwtValidator {
    issuer: String,
    audience: String,
    clock: Arc<dyn Clock>,
}

impl JwtValidator {
    pub fn new(issuer: String, audience: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer,
            audience,
            clock,
        }
    }

    /// Validate a bearer token.
    ///
    /// The block-list consult happens in the auth guard before this is
    /// called; validation itself has no side effects, so callers decide
    /// what to record.
    pub fn validate(
        &self,
        token: &str,
        keys: &dyn KeyProvider,
        additional_audiences: &[String],
    ) -> Result<JwtClaims, ValidationFailure> {
        // Parse the header without verifying to gate on the algorithm
        // before any cryptography runs.
        let header = peek::unverified_header(token).ok_or_else(|| {
            ValidationFailure::new(SecurityEventKind::MalformedToken)
                .detail("reason", json!("invalid token header"))
        })?;
        let algorithm = header
            .get("alg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let kid = header.get("kid").and_then(Value::as_str);
        let header_jti = header.get("jti").and_then(Value::as_str).map(str::to_owned);

        if !ALLOWED_ALGORITHMS.contains(&algorithm.as_str()) {
            let mut failure = ValidationFailure::new(SecurityEventKind::InvalidAlgorithm)
                .detail("algorithm", json!(algorithm))
                .detail("allowed", json!(ALLOWED_ALGORITHMS));
            failure.token_jti = header_jti;
            return Err(failure);
        }

        let key = keys
            .decoding_key(kid)
            .map_err(|e| ValidationFailure::new(e.event_kind()))?;

        let mut audiences = vec![self.audience.clone()];
        audiences.extend(additional_audiences.iter().cloned());

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECONDS;
        validation.validate_nbf = true;
        validation.set_audience(&audiences);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let payload = decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(|e| self.classify(e, token))?
            .claims;

        // The library enforces only a subset of the required claims.
        let missing: Vec<&str> = REQUIRED_CLAIMS
            .iter()
            .copied()
            .filter(|claim| !payload.contains_key(*claim))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationFailure::new(SecurityEventKind::MissingClaims)
                .detail("missing", json!(missing))
                .identity_from(&payload));
        }

        // When the payload carries `typ`, it must be a bearer token.
        if let Some(typ) = payload.get("typ").and_then(Value::as_str) {
            if !typ.eq_ignore_ascii_case("bearer") {
                return Err(ValidationFailure::new(SecurityEventKind::InvalidTokenType)
                    .detail("typ", json!(typ))
                    .identity_from(&payload));
            }
        }

        let now = self.clock.now();
        let iat = payload.get("iat").and_then(Value::as_i64).unwrap_or_default();
        if iat < (now - Duration::hours(MAX_TOKEN_AGE_HOURS)).timestamp() {
            return Err(ValidationFailure::new(SecurityEventKind::TokenTooOld)
                .detail("issued_at", json!(iat))
                .identity_from(&payload));
        }
        if iat > (now + Duration::seconds(LEEWAY_SECONDS as i64)).timestamp() {
            return Err(ValidationFailure::new(SecurityEventKind::InvalidIssuedAt)
                .detail("issued_at", json!(iat))
                .identity_from(&payload));
        }

        let exp = payload.get("exp").and_then(Value::as_i64).unwrap_or_default();
        if exp - iat < MIN_TOKEN_LIFETIME_SECONDS {
            tracing::warn!(lifetime_seconds = exp - iat, "token with unusually short lifetime");
        }

        if let Some(sub) = payload.get("sub").and_then(Value::as_str) {
            if sub.len() < MIN_SUBJECT_LEN {
                tracing::warn!(sub, "token with suspicious subject format");
            }
        }

        serde_json::from_value(Value::Object(payload.clone())).map_err(|e| {
            ValidationFailure::new(SecurityEventKind::MalformedToken)
                .detail("reason", json!(e.to_string()))
                .identity_from(&payload)
        })
    }

    fn classify(&self, error: jsonwebtoken::errors::Error, token: &str) -> ValidationFailure {
        let kind = match error.kind() {
            ErrorKind::ExpiredSignature => SecurityEventKind::ExpiredToken,
            ErrorKind::ImmatureSignature => SecurityEventKind::TokenNotYetValid,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_) => SecurityEventKind::InvalidSignature,
            ErrorKind::InvalidIssuer => SecurityEventKind::InvalidIssuer,
            ErrorKind::InvalidAudience => SecurityEventKind::InvalidAudience,
            ErrorKind::InvalidAlgorithm => SecurityEventKind::InvalidAlgorithm,
            ErrorKind::MissingRequiredClaim(_) => SecurityEventKind::MissingClaims,
            _ => SecurityEventKind::MalformedToken,
        };
        let mut failure = ValidationFailure::new(kind).detail("jwt_error", json!(error.to_string()));
        if let Some(claims) = peek::unverified_claims(token) {
            failure = failure.identity_from(&claims);
        }
        failure
    }
}
