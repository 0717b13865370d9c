//! One-call lifecycle demonstration: provision issuer and subject, issue a
//! capability credential, verify, revoke, verify again. The whole trace
//! comes back in the response, revocation drift included.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::extract::Authed;
use crate::service;
use crate::state::AppState;

fn default_issuer_name() -> String {
    "procurement-agent".to_string()
}

fn default_subject_name() -> String {
    "supplier-api-agent".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LifecycleDemoRequest {
    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,
    #[serde(default = "default_subject_name")]
    pub subject_name: String,
    #[serde(default)]
    pub subject_did_override: Option<String>,
}

pub async fn lifecycle_demo(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Json(req): Json<LifecycleDemoRequest>,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["agents:create", "credentials:issue", "credentials:revoke"])?;
    let tenant_id = auth.tenant_id.clone();

    let (issuer, _) = service::provision_agent(&state, &tenant_id, &req.issuer_name)?;
    let (subject, _) = service::provision_agent(&state, &tenant_id, &req.subject_name)?;
    let subject_did = req.subject_did_override.unwrap_or_else(|| subject.did.clone());

    let mut claims = Map::new();
    claims.insert("capability".to_string(), json!("negotiate_contracts"));
    claims.insert("max_amount".to_string(), json!(100_000));

    let credential = service::issue_credential(
        &state,
        &tenant_id,
        &issuer,
        &subject_did,
        "CapabilityCredential",
        Some(3600),
        Some(&claims),
    )?;
    let status_list_url =
        service::default_status_list_url(&state.settings, &credential.status_list_id);

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: tenant_id.clone(),
            event_type: "workflow.lifecycle_demo.issued".to_string(),
            actor: issuer.id.to_string(),
            resource_type: "credential".to_string(),
            resource_id: credential.id.to_string(),
            payload: json!({
                "jti": credential.jti,
                "subject": subject_did,
                "status_list_index": credential.status_list_index,
            }),
        },
    );

    let verify_before = service::verify_with_status(&state, &credential.jwt).await?;

    state
        .store
        .set_revoked(&credential.status_list_id, credential.status_list_index)?;
    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: tenant_id.clone(),
            event_type: "workflow.lifecycle_demo.revoked".to_string(),
            actor: "workflow".to_string(),
            resource_type: "credential".to_string(),
            resource_id: credential.id.to_string(),
            payload: json!({
                "status_list_id": credential.status_list_id,
                "status_list_index": credential.status_list_index,
            }),
        },
    );

    let verify_after = service::verify_with_status(&state, &credential.jwt).await?;

    Ok(Json(json!({
        "tenant_id": tenant_id,
        "issuer_agent_id": issuer.id,
        "issuer_did": issuer.did,
        "subject_agent_id": subject.id,
        "subject_did": subject_did,
        "credential_id": credential.id,
        "vc_jwt": credential.jwt,
        "status_list_id": credential.status_list_id,
        "status_list_index": credential.status_list_index,
        "status_list_url": status_list_url,
        "verify_before": verify_before,
        "revoke": {"revoked": true, "credential_id": credential.id},
        "verify_after": verify_after,
    })))
}
