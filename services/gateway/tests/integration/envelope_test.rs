use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use makrgate_core::clock::Clock;
use makrgate_testing::token::TokenBuilder;

use crate::helpers::{body_json, get_request, header_str, post_json, send, test_app, test_state};

#[tokio::test]
async fn every_response_carries_request_id_and_timing() {
    let (state, _clock) = test_state("http://127.0.0.1:9");
    let app = test_app(state);

    let first = send(&app, get_request("/healthz", &[])).await;
    assert_eq!(first.status(), StatusCode::OK);

    let first_id = header_str(&first, "x-request-id").to_owned();
    assert!(Uuid::parse_str(&first_id).is_ok(), "request id {first_id} is not a uuid");

    let timing = header_str(&first, "x-response-time");
    assert!(timing.ends_with("ms"), "unexpected timing header {timing}");
    assert!(
        timing.trim_end_matches("ms").parse::<f64>().is_ok(),
        "timing header {timing} is not a number"
    );

    let second = send(&app, get_request("/healthz", &[])).await;
    assert_ne!(first_id, header_str(&second, "x-request-id"));
}

#[tokio::test]
async fn error_bodies_use_the_unified_shape() {
    let (state, _clock) = test_state("http://127.0.0.1:9");
    let app = test_app(state);

    let response = send(&app, post_json("/auth/refresh", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let request_id = header_str(&response, "x-request-id").to_owned();

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "missing_refresh_token");
    assert_eq!(json["error"]["message"], "Refresh token is required");
    assert_eq!(json["error"]["request_id"], request_id);
    assert!(json["error"]["timestamp"].is_f64());
}

#[tokio::test]
async fn protected_route_without_token_is_401_with_challenge() {
    let (state, _clock) = test_state("http://127.0.0.1:9");
    let app = test_app(state);

    let response = send(&app, get_request("/protected/ping", &[])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_str(&response, "www-authenticate"), "Bearer");

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "MISSING_TOKEN");
    assert_eq!(json["error"]["message"], "Authentication required");
}

#[tokio::test]
async fn valid_token_reaches_the_protected_handler_with_identity() {
    let (state, _clock) = test_state("http://127.0.0.1:9");
    let app = test_app(state);

    let builder = TokenBuilder::valid().claim("realm_access", json!({ "roles": ["maker"] }));
    let subject = builder.subject();
    let auth = format!("Bearer {}", builder.sign());
    let response = send(
        &app,
        get_request("/protected/ping", &[("authorization", auth.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["id"], subject);
    assert_eq!(json["roles"], json!(["maker"]));
}

#[tokio::test]
async fn unexpected_faults_render_a_500_and_hide_internals_in_production() {
    use axum::{Router, middleware, routing::get};
    use makrgate_core::envelope::{EnvelopeConfig, request_envelope};
    use makrgate_core::error::{ApiError, ApiResult};

    async fn boom() -> ApiResult<&'static str> {
        Err(anyhow::anyhow!("wiring broke").into())
    }

    for production in [false, true] {
        let app = Router::new().route("/boom", get(boom)).layer(
            middleware::from_fn_with_state(EnvelopeConfig { production }, request_envelope),
        );
        let response = send(&app, get_request("/boom", &[])).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let request_id = header_str(&response, "x-request-id").to_owned();

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"]["message"], "An internal server error occurred");
        assert_eq!(json["error"]["request_id"], request_id);
        if production {
            assert!(json["error"].get("details").is_none());
        } else {
            let message = json["error"]["details"]["exception_message"]
                .as_str()
                .unwrap();
            assert!(message.contains("wiring broke"));
        }
    }
}

#[tokio::test]
async fn expired_token_is_classified_on_the_response() {
    let (state, clock) = test_state("http://127.0.0.1:9");
    let app = test_app(state);

    let now = clock.now().timestamp();
    let token = TokenBuilder::valid()
        .claim("iat", json!(now - 1000))
        .claim("exp", json!(now - 100))
        .sign();
    let auth = format!("Bearer {token}");

    let response = send(
        &app,
        get_request("/protected/ping", &[("authorization", auth.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_str(&response, "www-authenticate"), "Bearer");

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "EXPIRED_TOKEN");
    assert_eq!(json["error"]["message"], "Authentication token has expired");
}
