use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::DecodingKey;
use serde_json::json;

use makrgate_auth_types::event::SecurityEventKind;
use makrgate_core::clock::Clock;
use makrgate_gateway::security::keys::{KeyError, KeyProvider, StaticKeyProvider};
use makrgate_gateway::security::validator::JwtValidator;
use makrgate_testing::clock::ManualClock;
use makrgate_testing::keys::RSA_PUBLIC_PEM;
use makrgate_testing::token::{TEST_AUDIENCE, TEST_ISSUER, TokenBuilder, raw_token};

fn setup() -> (JwtValidator, StaticKeyProvider, Arc<ManualClock>) {
    let manual = Arc::new(ManualClock::start_now());
    let clock: Arc<dyn Clock> = manual.clone();
    let validator = JwtValidator::new(TEST_ISSUER.to_owned(), TEST_AUDIENCE.to_owned(), clock);
    let keys = StaticKeyProvider::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).unwrap();
    (validator, keys, manual)
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[test]
fn valid_token_yields_normalized_user_info() {
    let (validator, keys, _clock) = setup();
    let builder = TokenBuilder::valid()
        .claim("preferred_username", json!("ada"))
        .claim("email", json!("ada@example.com"))
        .claim("email_verified", json!(true))
        .claim("realm_access", json!({ "roles": ["maker"] }))
        .claim("makerspace_id", json!("ms-7"));
    let subject = builder.subject();
    let token = builder.sign();

    let claims = validator.validate(&token, &keys, &[]).unwrap();
    assert_eq!(claims.sub, subject);
    assert!(claims.has_role("maker"));
    assert!(!claims.is_admin());

    let user = claims.user_info();
    assert_eq!(user.id, subject);
    assert_eq!(user.username.as_deref(), Some("ada"));
    assert_eq!(user.roles, ["maker"]);
    assert_eq!(user.makerspace_id.as_deref(), Some("ms-7"));
}

#[test]
fn bearer_typ_is_accepted_case_insensitively() {
    let (validator, keys, _clock) = setup();
    for typ in ["Bearer", "bearer", "BEARER"] {
        let token = TokenBuilder::valid().claim("typ", json!(typ)).sign();
        assert!(
            validator.validate(&token, &keys, &[]).is_ok(),
            "typ {typ} should be accepted"
        );
    }
}

// ── Expiry and clock skew ────────────────────────────────────────────────────

#[test]
fn expired_token_is_rejected() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 1000))
        .claim("exp", json!(now - 100))
        .sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::ExpiredToken);
}

#[test]
fn expiry_within_leeway_is_accepted() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    // 20 seconds past exp, inside the 30-second skew allowance.
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 900))
        .claim("exp", json!(now - 20))
        .sign();
    assert!(validator.validate(&token, &keys, &[]).is_ok());

    // Well past the allowance.
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 900))
        .claim("exp", json!(now - 45))
        .sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::ExpiredToken);
}

#[test]
fn not_yet_valid_token_is_rejected() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid().claim("nbf", json!(now + 600)).sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::TokenNotYetValid);
}

// ── Token age ────────────────────────────────────────────────────────────────

#[test]
fn stale_issue_time_is_rejected_even_with_future_expiry() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 25 * 3600))
        .claim("exp", json!(now + 840))
        .sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::TokenTooOld);
}

#[test]
fn issue_time_inside_the_age_bound_is_accepted() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 23 * 3600))
        .claim("exp", json!(now + 840))
        .sign();
    assert!(validator.validate(&token, &keys, &[]).is_ok());
}

#[test]
fn issue_time_in_the_future_is_rejected() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now + 3600))
        .claim("exp", json!(now + 4500))
        .sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidIssuedAt);
}

#[test]
fn age_check_uses_the_injected_clock() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 23 * 3600))
        .claim("exp", json!(now + 2 * 3600))
        .sign();
    assert!(validator.validate(&token, &keys, &[]).is_ok());

    // Two hours later the same token crosses the 24-hour age bound.
    clock.advance(Duration::hours(2));
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::TokenTooOld);
}

// ── Algorithm gating ─────────────────────────────────────────────────────────

#[test]
fn hs256_downgrade_is_rejected_with_details() {
    let (validator, keys, _clock) = setup();
    let token = TokenBuilder::valid().sign_hs256(b"guessed-secret");
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidAlgorithm);

    let details = failure.details.unwrap();
    assert_eq!(details["algorithm"], "HS256");
    assert_eq!(details["allowed"], json!(["RS256"]));
}

#[test]
fn alg_none_is_rejected() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let token = raw_token(
        &json!({ "alg": "none", "typ": "JWT" }),
        &json!({
            "sub": "u-12345678",
            "iat": now - 60,
            "exp": now + 840,
            "iss": TEST_ISSUER,
            "aud": TEST_AUDIENCE,
        }),
    );
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidAlgorithm);
    assert_eq!(failure.details.unwrap()["algorithm"], "none");
}

// ── Signature, issuer, audience ──────────────────────────────────────────────

#[test]
fn wrong_key_is_an_invalid_signature() {
    let (validator, keys, _clock) = setup();
    let token = TokenBuilder::valid().sign_with_wrong_key();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidSignature);
}

#[test]
fn wrong_issuer_is_rejected() {
    let (validator, keys, _clock) = setup();
    let token = TokenBuilder::valid()
        .claim("iss", json!("https://evil.example/realms/r1"))
        .sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidIssuer);
}

#[test]
fn wrong_audience_is_rejected() {
    let (validator, keys, _clock) = setup();
    let token = TokenBuilder::valid().claim("aud", json!("billing")).sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidAudience);
}

// ── Required claims and token type ───────────────────────────────────────────

#[test]
fn any_missing_required_claim_is_missing_claims() {
    let (validator, keys, _clock) = setup();
    for claim in ["sub", "iat", "exp", "iss", "aud"] {
        let token = TokenBuilder::valid().without_claim(claim).sign();
        let failure = validator.validate(&token, &keys, &[]).unwrap_err();
        assert_eq!(
            failure.kind,
            SecurityEventKind::MissingClaims,
            "dropping {claim} should classify as MISSING_CLAIMS"
        );
    }
}

#[test]
fn non_bearer_typ_is_rejected() {
    let (validator, keys, _clock) = setup();
    let token = TokenBuilder::valid().claim("typ", json!("Refresh")).sign();
    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::InvalidTokenType);
}

// ── Failure context ──────────────────────────────────────────────────────────

#[test]
fn failures_carry_identity_from_the_unverified_payload() {
    let (validator, keys, clock) = setup();
    let now = clock.now().timestamp();
    let builder = TokenBuilder::valid()
        .claim("iat", json!(now - 1000))
        .claim("exp", json!(now - 100))
        .claim("jti", json!("tok-9"));
    let subject = builder.subject();
    let token = builder.sign();

    let failure = validator.validate(&token, &keys, &[]).unwrap_err();
    assert_eq!(failure.kind, SecurityEventKind::ExpiredToken);
    assert_eq!(failure.user_id.as_deref(), Some(subject.as_str()));
    assert_eq!(failure.token_jti.as_deref(), Some("tok-9"));
}

// ── Key provider failures ────────────────────────────────────────────────────

struct BrokenKeys(fn() -> KeyError);

impl KeyProvider for BrokenKeys {
    fn decoding_key(&self, _kid: Option<&str>) -> Result<DecodingKey, KeyError> {
        Err((self.0)())
    }
}

#[test]
fn key_provider_failures_classify_as_infrastructure_kinds() {
    let (validator, _keys, _clock) = setup();
    let token = TokenBuilder::valid().sign();

    let cases: [(fn() -> KeyError, SecurityEventKind); 3] = [
        (|| KeyError::NotFound, SecurityEventKind::KeyNotFound),
        (|| KeyError::Fetch, SecurityEventKind::JwksFetchError),
        (|| KeyError::Network, SecurityEventKind::NetworkError),
    ];
    for (make, expected) in cases {
        let failure = validator.validate(&token, &BrokenKeys(make), &[]).unwrap_err();
        assert_eq!(failure.kind, expected);
    }
}
