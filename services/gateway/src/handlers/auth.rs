use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

fn parse_refresh_token(body: &str) -> Option<String> {
    serde_json::from_str::<RefreshRequest>(body)
        .ok()
        .and_then(|request| request.refresh_token)
        .filter(|token| !token.trim().is_empty())
}

// ── POST /auth/refresh ────────────────────────────────────────────────────────

pub async fn refresh(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, GatewayError> {
    let refresh_token = parse_refresh_token(&body).ok_or(GatewayError::MissingRefreshToken)?;
    let info = state.refresh.refresh_access_token(&refresh_token).await?;
    Ok(Json(json!({
        "access_token": info.access_token,
        "token_type": info.token_type,
        "expires_in": info.expires_in,
        "refresh_token": info.refresh_token,
        "scope": info.scope,
    })))
}

// ── POST /auth/logout ─────────────────────────────────────────────────────────

/// Best-effort revocation: the caller is logged out whether or not the
/// provider accepts the revoke call.
pub async fn logout(State(state): State<AppState>, body: String) -> Json<Value> {
    if let Some(refresh_token) = parse_refresh_token(&body) {
        state.refresh.revoke_refresh_token(&refresh_token).await;
    }
    Json(json!({ "message": "Logged out successfully" }))
}
