use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use makrgate_core::envelope::{EnvelopeConfig, request_envelope};
use makrgate_core::health::{healthz, readyz};

use crate::handlers::auth::{logout, refresh};
use crate::middleware::{proactive_token_refresh, require_auth};
use crate::state::AppState;

/// Build the gateway router.
///
/// `protected` holds downstream business routes; they are placed behind
/// the authentication guard and the proactive-refresh pass. The request
/// envelope and the trace layer wrap everything, auth routes included.
pub fn build_router(state: AppState, envelope: EnvelopeConfig, protected: Router<AppState>) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Token refresh and logout
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .merge(protect(protected, &state))
        .layer(middleware::from_fn_with_state(envelope, request_envelope))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Place a router behind the authentication guard. The guard runs
/// before the inner routes; the proactive-refresh pass wraps them from
/// the inside so it only sees authenticated traffic.
pub fn protect(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .layer(middleware::from_fn_with_state(
            state.clone(),
            proactive_token_refresh,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
