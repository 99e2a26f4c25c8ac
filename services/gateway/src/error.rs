use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use makrgate_core::error::{ErrorCode, ErrorPayload, UNKNOWN_REQUEST_ID};

use crate::refresh::RefreshError;
use crate::security::validator::ValidationFailure;

/// Gateway request-level failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request origin is on the block list.
    #[error("too many authentication failures")]
    Blocked,
    /// Token validation failed; carries the failure classification.
    #[error("authentication failed")]
    Auth(ValidationFailure),
    /// The refresh endpoint was called without a refresh token.
    #[error("refresh token is required")]
    MissingRefreshToken,
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable code rendered into the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blocked => ErrorCode::RateLimited.as_str(),
            Self::Auth(failure) => failure.kind.as_str(),
            Self::MissingRefreshToken => "missing_refresh_token",
            Self::Refresh(e) => e.code(),
            Self::Internal(_) => ErrorCode::InternalError.as_str(),
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            Self::Blocked => ErrorPayload::new(
                StatusCode::TOO_MANY_REQUESTS,
                self.code(),
                "Too many authentication failures. Try again later.",
            ),
            Self::Auth(failure) => ErrorPayload::new(
                failure.kind.http_status(),
                self.code(),
                failure.kind.client_message(),
            ),
            Self::MissingRefreshToken => ErrorPayload::new(
                StatusCode::BAD_REQUEST,
                self.code(),
                "Refresh token is required",
            ),
            Self::Refresh(e) => ErrorPayload::new(e.status(), self.code(), e.to_string()),
            Self::Internal(e) => {
                let mut payload = ErrorPayload::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.code(),
                    "An internal server error occurred",
                );
                payload.internal = Some(("unexpected_error".to_owned(), format!("{e:#}")));
                payload
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL_ERROR", "internal error");
        }
        let payload = self.payload();
        let body = payload.body(UNKNOWN_REQUEST_ID, true);
        let mut response = (payload.status, axum::Json(body)).into_response();

        match &self {
            // Blocked origins learn when to come back.
            Self::Blocked => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("3600"));
            }
            // Auth failures advertise the challenge scheme, except when
            // the failure is the gateway's own infrastructure (503).
            Self::Auth(failure) if failure.kind.http_status() != StatusCode::SERVICE_UNAVAILABLE => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }

        response.extensions_mut().insert(payload);
        response
    }
}
