//! Development-only token minting. 404s unless dev mode is on, so the
//! route is invisible in production deployments.

use axum::extract::State;
use axum::Json;
use credo_auth::hs256;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

fn default_subject() -> String {
    "dev".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "agents:create".to_string(),
        "credentials:issue".to_string(),
        "credentials:revoke".to_string(),
    ]
}

fn default_ttl() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
pub struct DevTokenRequest {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: i64,
}

pub async fn dev_token(
    State(state): State<AppState>,
    Json(req): Json<DevTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.settings.dev_mode {
        return Err(ApiError::NotFound("Resource"));
    }
    if !(60..=86_400).contains(&req.ttl_seconds) {
        return Err(ApiError::Validation(
            "ttl_seconds must be between 60 and 86400".to_string(),
        ));
    }

    let token = hs256::issue_token(
        &state.settings.auth_jwt_secret,
        &state.settings.auth_jwt_issuer,
        &req.subject,
        &req.scopes,
        "default",
        req.ttl_seconds,
    )
    .map_err(|_| ApiError::AuthInvalid)?;

    Ok(Json(json!({
        "token": token,
        "token_type": "Bearer",
        "scopes": req.scopes,
        "expires_in": req.ttl_seconds,
    })))
}
