//! Request extractors.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use credo_auth::AuthContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Verified bearer identity. Handlers call `require_scopes` themselves so
/// each route declares exactly the scopes it needs.
pub struct Authed(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::AuthMissing)?;

        let mut pieces = header.splitn(2, ' ');
        let scheme = pieces.next().unwrap_or_default();
        let token = pieces.next().map(str::trim).unwrap_or_default();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(ApiError::AuthMissing);
        }

        let ctx = state
            .authenticator
            .verify(token)
            .await
            .map_err(|_| ApiError::AuthInvalid)?;
        Ok(Authed(ctx))
    }
}

/// Idempotency key from the request headers: trimmed, capped at 200 chars.
pub fn idempotency_key(parts: &axum::http::HeaderMap) -> Option<String> {
    parts
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(200).collect())
}
