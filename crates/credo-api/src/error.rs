use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use credo_auth::AuthError;
use credo_core::CoreError;
use credo_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// API error taxonomy. Rendered as `{"error": ..., "request_id": ...}`;
/// the request-id middleware merges the id in.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing Authorization header")]
    AuthMissing,

    #[error("Invalid token")]
    AuthInvalid,

    #[error("{0}")]
    ScopeInsufficient(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    IdempotencyConflict(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Status list is full")]
    StatusListFull,

    #[error("internal_error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthMissing | ApiError::AuthInvalid => StatusCode::UNAUTHORIZED,
            ApiError::ScopeInsufficient(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::IdempotencyConflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::StatusListFull | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Never leak internals; 5xx responses carry a stable code only.
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                "internal_error".to_string()
            }
            ApiError::StatusListFull => {
                tracing::warn!("status list exhausted");
                "status_list_full".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => ApiError::AuthMissing,
            AuthError::ScopeInsufficient { .. } => ApiError::ScopeInsufficient(err.to_string()),
            AuthError::Invalid(_) | AuthError::Config(_) => ApiError::AuthInvalid,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource } => ApiError::NotFound(resource),
            StoreError::StatusListFull => ApiError::StatusListFull,
            StoreError::IndexOutOfBounds { .. } => ApiError::Validation(err.to_string()),
            StoreError::Database(_)
            | StoreError::Serialization(_)
            | StoreError::Signer(_)
            | StoreError::Corrupt(_) => ApiError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::Validation(msg),
            CoreError::Resolution(msg) => ApiError::Validation(msg),
            CoreError::StatusListFull => ApiError::StatusListFull,
            CoreError::Jwt(e) => ApiError::Validation(e.to_string()),
            CoreError::Kms(_) | CoreError::Serialization(_) => {
                ApiError::Internal(anyhow::Error::new(err))
            }
        }
    }
}
