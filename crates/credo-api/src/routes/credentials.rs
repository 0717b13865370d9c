use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Authed;
use crate::service;
use crate::state::AppState;

fn default_credential_type() -> String {
    "AgentCredential".to_string()
}

#[derive(Debug, Deserialize)]
pub struct IssueCredentialRequest {
    pub issuer_agent_id: Uuid,
    pub subject_did: String,
    #[serde(default = "default_credential_type")]
    pub credential_type: String,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    #[serde(default)]
    pub subject_claims: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct IssueCredentialResponse {
    pub credential_id: Uuid,
    pub jwt: String,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status_list_id: Uuid,
    pub status_list_index: u32,
}

pub async fn issue(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Json(req): Json<IssueCredentialRequest>,
) -> Result<Json<IssueCredentialResponse>, ApiError> {
    auth.require_scopes(&["credentials:issue"])?;

    if req.subject_did.len() < 3 || req.subject_did.len() > 600 {
        return Err(ApiError::Validation(
            "subject_did must be between 3 and 600 characters".to_string(),
        ));
    }
    if let Some(ttl) = req.ttl_seconds {
        if !(60..=31_536_000).contains(&ttl) {
            return Err(ApiError::Validation(
                "ttl_seconds must be between 60 and 31536000".to_string(),
            ));
        }
    }

    let issuer = state
        .store
        .get_agent(&auth.tenant_id, &req.issuer_agent_id)?
        .ok_or(ApiError::NotFound("Issuer agent"))?;

    let credential = service::issue_credential(
        &state,
        &auth.tenant_id,
        &issuer,
        &req.subject_did,
        &req.credential_type,
        req.ttl_seconds,
        req.subject_claims.as_ref(),
    )?;

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: auth.tenant_id.clone(),
            event_type: "credential.issued".to_string(),
            actor: req.issuer_agent_id.to_string(),
            resource_type: "credential".to_string(),
            resource_id: credential.id.to_string(),
            payload: json!({
                "jti": credential.jti,
                "subject": req.subject_did,
                "type": req.credential_type,
                "status_list_index": credential.status_list_index,
            }),
        },
    );

    Ok(Json(IssueCredentialResponse {
        credential_id: credential.id,
        jwt: credential.jwt,
        jti: credential.jti,
        issued_at: credential.issued_at,
        expires_at: credential.expires_at,
        status_list_id: credential.status_list_id,
        status_list_index: credential.status_list_index,
    }))
}
