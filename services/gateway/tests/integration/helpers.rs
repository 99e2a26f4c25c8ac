use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tower::ServiceExt;

use makrgate_auth_types::claims::UserInfo;
use makrgate_core::clock::Clock;
use makrgate_core::envelope::EnvelopeConfig;
use makrgate_gateway::refresh::TokenRefreshClient;
use makrgate_gateway::router::build_router;
use makrgate_gateway::security::keys::StaticKeyProvider;
use makrgate_gateway::security::monitor::SecurityMonitor;
use makrgate_gateway::security::validator::JwtValidator;
use makrgate_gateway::state::AppState;
use makrgate_testing::clock::ManualClock;
use makrgate_testing::keys::RSA_PUBLIC_PEM;
use makrgate_testing::token::{TEST_AUDIENCE, TEST_ISSUER};

pub const TEST_REALM: &str = "r1";

/// Gateway state wired against the test fixtures, with a manual clock
/// driving all window and expiry logic.
pub fn test_state(keycloak_url: &str) -> (AppState, Arc<ManualClock>) {
    let manual = Arc::new(ManualClock::start_now());
    let clock: Arc<dyn Clock> = manual.clone();
    let state = AppState {
        validator: Arc::new(JwtValidator::new(
            TEST_ISSUER.to_owned(),
            TEST_AUDIENCE.to_owned(),
            clock.clone(),
        )),
        security: Arc::new(SecurityMonitor::new(clock.clone())),
        refresh: Arc::new(TokenRefreshClient::new(
            keycloak_url,
            TEST_REALM,
            "gateway".to_owned(),
            "secret".to_owned(),
            clock.clone(),
        )),
        keys: Arc::new(StaticKeyProvider::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).unwrap()),
        clock,
    };
    (state, manual)
}

/// The gateway router plus one protected probe route behind the guard.
/// The probe echoes the identity injected by the guard.
pub fn test_app(state: AppState) -> Router {
    let protected = Router::new().route(
        "/protected/ping",
        get(|Extension(user): Extension<UserInfo>| async move {
            Json(serde_json::json!({ "id": user.id, "roles": user.roles }))
        }),
    );
    build_router(state, EnvelopeConfig { production: false }, protected)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get_request(path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| panic!("missing header {name}"))
}
