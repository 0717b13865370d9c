//! Public verification endpoint. Fail closed: any failure anywhere in the
//! pipeline is a 400, never a verified result.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub jwt: String,
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.jwt.len() < 10 {
        return Err(ApiError::Validation("jwt too short".to_string()));
    }

    let verdict = service::verify_with_status(&state, &req.jwt)
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: "public".to_string(),
            event_type: "credential.verified".to_string(),
            actor: "verifier".to_string(),
            resource_type: "credential".to_string(),
            resource_id: verdict["payload"]
                .get("jti")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            payload: json!({
                "iss": verdict["payload"].get("iss"),
                "sub": verdict["payload"].get("sub"),
                "status": verdict.get("status"),
            }),
        },
    );

    Ok(Json(verdict))
}
