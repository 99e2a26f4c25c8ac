use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};

/// Result alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// Request id rendered into error bodies produced outside the envelope
/// (unit tests, misconfigured wiring). The envelope replaces it.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Closed set of machine-readable error codes shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    MissingField,
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    InternalError,
    DatabaseError,
    ExternalServiceError,
    ConfigurationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingField => "MISSING_FIELD",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// Code for a bare HTTP status, for errors raised without a code.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::InvalidInput,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            422 => Self::ValidationError,
            429 => Self::RateLimited,
            _ => Self::InternalError,
        }
    }
}

/// Machine-readable description of an error response.
///
/// Every error `IntoResponse` impl attaches one of these to the response
/// extensions; the request envelope re-renders the body from it with the
/// real request id and the environment's disclosure policy.
#[derive(Debug, Clone)]
pub struct ErrorPayload {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub field_errors: Option<BTreeMap<String, String>>,
    pub details: Option<Value>,
    /// `(kind, message)` of an unexpected fault. Rendered into `details`
    /// only outside production.
    pub internal: Option<(String, String)>,
}

impl ErrorPayload {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            field_errors: None,
            details: None,
            internal: None,
        }
    }

    /// Render the response body.
    ///
    /// ```json
    /// { "error": { "message", "code", "request_id", "timestamp",
    ///              "field_errors"?, "details"? } }
    /// ```
    pub fn body(&self, request_id: &str, production: bool) -> Value {
        let mut error = json!({
            "message": self.message,
            "code": self.code,
            "request_id": request_id,
            "timestamp": unix_timestamp(),
        });
        if let Some(fields) = &self.field_errors {
            error["field_errors"] = json!(fields);
        }
        if let Some(details) = &self.details {
            error["details"] = details.clone();
        }
        if !production {
            if let Some((kind, message)) = &self.internal {
                error["details"] = json!({
                    "exception_type": kind,
                    "exception_message": message,
                });
            }
        }
        json!({ "error": error })
    }
}

fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Service-level error sum type with automatic HTTP conversion.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Domain error raised with an explicit code and status.
    #[error("{message}")]
    Api {
        message: String,
        code: ErrorCode,
        status: StatusCode,
        field_errors: Option<BTreeMap<String, String>>,
        details: Option<Value>,
    },
    /// One or more field-level input failures.
    #[error("Request validation failed")]
    Validation { field_errors: BTreeMap<String, String> },
    /// A known HTTP failure without further structure.
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },
    /// Anything else. Converted to a 500, never propagated.
    #[error("internal server error")]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn api(message: impl Into<String>, code: ErrorCode, status: StatusCode) -> Self {
        Self::Api {
            message: message.into(),
            code,
            status,
            field_errors: None,
            details: None,
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::api(
            format!("{resource} not found"),
            ErrorCode::NotFound,
            StatusCode::NOT_FOUND,
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::api(message, ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::api(message, ErrorCode::Forbidden, StatusCode::FORBIDDEN)
    }

    pub fn conflict(resource: &str) -> Self {
        Self::api(
            format!("{resource} already exists"),
            ErrorCode::Conflict,
            StatusCode::CONFLICT,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::api(
            message,
            ErrorCode::InternalError,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    pub fn validation(field_errors: BTreeMap<String, String>) -> Self {
        Self::Validation { field_errors }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Api { status, .. } => *status,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Http { status, .. } => *status,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        match self {
            Self::Api {
                message,
                code,
                status,
                field_errors,
                details,
            } => ErrorPayload {
                status: *status,
                code: code.as_str().to_owned(),
                message: message.clone(),
                field_errors: field_errors.clone(),
                details: details.clone(),
                internal: None,
            },
            Self::Validation { field_errors } => ErrorPayload {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: ErrorCode::ValidationError.as_str().to_owned(),
                message: "Request validation failed".to_owned(),
                field_errors: Some(field_errors.clone()),
                details: None,
                internal: None,
            },
            Self::Http { status, detail } => ErrorPayload::new(
                *status,
                ErrorCode::from_status(*status).as_str(),
                detail.clone(),
            ),
            Self::Unexpected(e) => {
                let mut payload = ErrorPayload::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::InternalError.as_str(),
                    "An internal server error occurred",
                );
                payload.internal = Some(("unexpected_error".to_owned(), format!("{e:#}")));
                payload
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 5xx need the cause logged; 4xx are expected client errors and
        // already visible through the request trace.
        if let Self::Unexpected(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL_ERROR", "unexpected error");
        }
        let payload = self.payload();
        let body = payload.body(UNKNOWN_REQUEST_ID, true);
        let mut response = (payload.status, axum::Json(body)).into_response();
        response.extensions_mut().insert(payload);
        response
    }
}
