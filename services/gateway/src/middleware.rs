use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use makrgate_auth_types::event::SecurityEventKind;
use makrgate_core::envelope::RequestContext;

use crate::error::GatewayError;
use crate::refresh::{TokenRefreshClient, token_response_headers};
use crate::security::validator::ValidationFailure;
use crate::state::AppState;

/// Authentication guard for protected routes.
///
/// Order per request: block-list consult, bearer extraction, token
/// validation. Every failure is recorded as exactly one security event;
/// the response carries the original failure kind while any
/// reclassification (brute force, suspicious pattern) lives on the
/// logged event.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(RequestContext::detached);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Unknown")
        .to_owned();

    if state.security.is_blocked(&ctx.origin) {
        return Err(GatewayError::Blocked);
    }

    let Some(token) = bearer_token(&request) else {
        state
            .security
            .record(SecurityEventKind::MissingToken, &ctx, &user_agent, None, None, None);
        return Err(GatewayError::Auth(ValidationFailure::new(
            SecurityEventKind::MissingToken,
        )));
    };

    match state.validator.validate(&token, state.keys.as_ref(), &[]) {
        Ok(claims) => {
            request.extensions_mut().insert(claims.user_info());
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(failure) => {
            state.security.record(
                failure.kind,
                &ctx,
                &user_agent,
                failure.user_id.clone(),
                failure.token_jti.clone(),
                failure.details.clone(),
            );
            Err(GatewayError::Auth(failure))
        }
    }
}

/// Proactive token refresh.
///
/// When the presented access token is inside the refresh window and the
/// request carries a refresh token, refresh once and stamp the
/// `X-Token-*` expiry metadata on the response. Refresh failures are
/// logged and never fail the request.
pub async fn proactive_token_refresh(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let access_token = bearer_token(&request);
    let headers = request.headers().clone();
    let mut response = next.run(request).await;

    let Some(access_token) = access_token else {
        return response;
    };
    let (needs_refresh, seconds_left) = state.refresh.check_token_expiration(&access_token);
    if !needs_refresh {
        return response;
    }
    let jar = CookieJar::from_headers(&headers);
    let Some(refresh_token) = TokenRefreshClient::extract_refresh_token(&headers, &jar) else {
        tracing::warn!("no refresh token available for automatic refresh");
        return response;
    };

    tracing::info!(seconds_left, "access token expiring, refreshing proactively");
    match state.refresh.refresh_access_token(&refresh_token).await {
        Ok(info) => {
            response.headers_mut().extend(token_response_headers(&info));
        }
        Err(e) => {
            tracing::warn!(code = e.code(), "automatic token refresh failed");
        }
    }
    response
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}
