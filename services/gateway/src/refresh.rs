use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::CookieJar;
use chrono::SecondsFormat;
use serde_json::Value;

use makrgate_auth_types::peek;
use makrgate_auth_types::token::{TokenInfo, TokenResponse};
use makrgate_core::clock::Clock;

/// Seconds left on an access token below which a refresh is due.
pub const REFRESH_THRESHOLD_SECONDS: i64 = 300;
const MAX_REFRESH_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "MakrX-Backend/1.0";

/// Terminal outcomes of a refresh attempt.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Refresh token is invalid or expired")]
    InvalidRefreshToken,
    #[error("Refresh token has expired, please login again")]
    Expired,
    #[error("Token refresh service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Token refresh service timeout")]
    ServiceTimeout,
    #[error("Token refresh failed due to internal error")]
    Failed,
}

impl RefreshError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::Expired => "refresh_token_expired",
            Self::ServiceUnavailable => "token_service_unavailable",
            Self::ServiceTimeout => "token_service_timeout",
            Self::Failed => "token_refresh_failed",
        }
    }

    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidRefreshToken | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable | Self::ServiceTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Client for the identity provider's token and revocation endpoints.
pub struct TokenRefreshClient {
    http: reqwest::Client,
    token_endpoint: String,
    revoke_endpoint: String,
    client_id: String,
    client_secret: String,
    clock: Arc<dyn Clock>,
}

impl TokenRefreshClient {
    pub fn new(
        keycloak_url: &str,
        realm: &str,
        client_id: String,
        client_secret: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build identity-provider HTTP client");
        Self {
            http,
            token_endpoint: format!("{keycloak_url}/realms/{realm}/protocol/openid-connect/token"),
            revoke_endpoint: format!(
                "{keycloak_url}/realms/{realm}/protocol/openid-connect/revoke"
            ),
            client_id,
            client_secret,
            clock,
        }
    }

    /// Exchange a refresh token for a fresh [`TokenInfo`].
    ///
    /// 400 and 401 from the provider are terminal; anything else
    /// (including timeouts) is retried with a linear delay until the
    /// attempt budget runs out.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenInfo, RefreshError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            let response = match self.http.post(&self.token_endpoint).form(&form).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    tracing::error!(attempt, "token refresh timed out");
                    if attempt < MAX_REFRESH_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(RefreshError::ServiceTimeout);
                }
                Err(e) => {
                    tracing::error!(error = %e, "token refresh transport error");
                    return Err(RefreshError::Failed);
                }
            };

            match response.status().as_u16() {
                200 => {
                    let body: TokenResponse = response.json().await.map_err(|e| {
                        tracing::error!(error = %e, "token response body did not parse");
                        RefreshError::Failed
                    })?;
                    return Ok(TokenInfo::from_response(body, self.clock.now()));
                }
                400 => {
                    tracing::warn!("token refresh rejected: invalid refresh token");
                    return Err(RefreshError::InvalidRefreshToken);
                }
                401 => {
                    tracing::warn!("token refresh rejected: refresh token expired");
                    return Err(RefreshError::Expired);
                }
                status => {
                    tracing::warn!(attempt, status, "token refresh attempt failed");
                    if attempt < MAX_REFRESH_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(RefreshError::ServiceUnavailable);
                }
            }
        }
        Err(RefreshError::ServiceUnavailable)
    }

    /// Whether the access token is due for refresh, and the seconds it
    /// has left. Unreadable tokens and tokens without `exp` count as
    /// needing refresh immediately.
    pub fn check_token_expiration(&self, token: &str) -> (bool, i64) {
        let Some(claims) = peek::unverified_claims(token) else {
            return (true, 0);
        };
        let Some(exp) = claims.get("exp").and_then(Value::as_i64) else {
            return (true, 0);
        };
        let remaining = exp - self.clock.now().timestamp();
        if remaining <= 0 {
            return (true, 0);
        }
        (remaining <= REFRESH_THRESHOLD_SECONDS, remaining)
    }

    /// Pull a refresh token off the request: `Authorization: Refresh`
    /// first, then the `X-Refresh-Token` header, then the
    /// `refresh_token` cookie.
    pub fn extract_refresh_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
        if let Some(auth) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = auth.strip_prefix("Refresh ") {
                return Some(token.to_owned());
            }
        }
        if let Some(value) = headers.get("x-refresh-token").and_then(|v| v.to_str().ok()) {
            return Some(value.to_owned());
        }
        jar.get("refresh_token").map(|c| c.value().to_owned())
    }

    /// Revoke a refresh token at the provider. Failures are logged and
    /// reported as `false`; the logout path never fails on them.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> bool {
        let form = [
            ("token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        match self.http.post(&self.revoke_endpoint).form(&form).send().await {
            Ok(response) if response.status().as_u16() == 200 => true,
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "token revocation failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "token revocation transport error");
                false
            }
        }
    }
}

/// Expiry metadata headers for responses that carry a refreshed token.
pub fn token_response_headers(info: &TokenInfo) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&info.expires_in.to_string()) {
        headers.insert("x-token-expires-in", value);
    }
    if let Ok(value) = HeaderValue::from_str(&info.token_type) {
        headers.insert("x-token-type", value);
    }
    let expires_at = info.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&expires_at) {
        headers.insert("x-token-expires-at", value);
    }
    headers
}
