use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::error::ErrorPayload;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_RESPONSE_TIME: &str = "x-response-time";

/// Per-request context created at entry and carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Fresh random identifier, echoed on every response.
    pub request_id: String,
    /// Resolved client origin used as the abuse-tracking key.
    pub origin: String,
    /// Entry time, used for the response-time header.
    pub started: Instant,
}

impl RequestContext {
    pub fn new(origin: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            origin,
            started: Instant::now(),
        }
    }

    /// Context for code running outside the envelope (unit tests,
    /// misconfigured wiring).
    pub fn detached() -> Self {
        let mut ctx = Self::new("unknown".to_owned());
        ctx.request_id = "unknown".to_owned();
        ctx
    }
}

/// Envelope settings fixed at wiring time.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Suppresses internal fault details in error bodies when set.
    pub production: bool,
}

/// Resolve the client origin: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the connection peer, else `"unknown"`.
pub fn resolve_origin<B>(request: &axum::http::Request<B>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_owned();
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_owned()
}

/// Request envelope middleware.
///
/// Assigns the request id, runs the inner stack, re-renders error bodies
/// attached as [`ErrorPayload`] extensions with the real request id, and
/// stamps `X-Request-ID` / `X-Response-Time` on every response.
pub async fn request_envelope(
    State(config): State<EnvelopeConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::new(resolve_origin(&request));
    let request_id = ctx.request_id.clone();
    let started = ctx.started;
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    if let Some(payload) = response.extensions().get::<ErrorPayload>().cloned() {
        response = render_error(response, &payload, &request_id, config.production);
    }

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(X_REQUEST_ID),
        HeaderValue::from_str(&request_id).unwrap_or(HeaderValue::from_static("unknown")),
    );
    headers.insert(
        HeaderName::from_static(X_RESPONSE_TIME),
        HeaderValue::from_str(&format!("{elapsed_ms:.2}ms"))
            .unwrap_or(HeaderValue::from_static("0.00ms")),
    );
    response
}

/// Replace the body of an error response with the enveloped rendering,
/// preserving status and headers set by the error source (for example
/// `WWW-Authenticate` and `Retry-After`).
fn render_error(
    response: Response,
    payload: &ErrorPayload,
    request_id: &str,
    production: bool,
) -> Response {
    let (parts, _) = response.into_parts();
    let mut rendered = axum::Json(payload.body(request_id, production)).into_response();
    *rendered.status_mut() = parts.status;
    for (name, value) in parts.headers.iter() {
        if name != &CONTENT_TYPE && name != &axum::http::header::CONTENT_LENGTH {
            rendered.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rendered
}
