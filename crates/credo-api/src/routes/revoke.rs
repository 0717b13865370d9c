use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Authed;
use crate::service;
use crate::state::AppState;

pub async fn revoke(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Path(credential_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["credentials:revoke"])?;

    let credential = state
        .store
        .get_credential(&auth.tenant_id, &credential_id)?
        .ok_or(ApiError::NotFound("Credential"))?;

    state
        .store
        .set_revoked(&credential.status_list_id, credential.status_list_index)?;

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: auth.tenant_id.clone(),
            event_type: "credential.revoked".to_string(),
            actor: "revoker".to_string(),
            resource_type: "credential".to_string(),
            resource_id: credential_id.to_string(),
            payload: json!({
                "status_list_id": credential.status_list_id,
                "status_list_index": credential.status_list_index,
            }),
        },
    );

    Ok(Json(json!({
        "revoked": true,
        "credential_id": credential_id,
    })))
}
