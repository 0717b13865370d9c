use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::Authed;
use crate::service;
use crate::state::AppState;

/// Destroy every row owned by the caller's tenant. The audit record is
/// written after the wipe so it survives under the freshly re-created
/// tenant.
pub async fn reset(
    State(state): State<AppState>,
    Authed(auth): Authed,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["tenant:admin"])?;

    state.store.reset_tenant(&auth.tenant_id)?;

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: auth.tenant_id.clone(),
            event_type: "tenant.reset".to_string(),
            actor: "admin".to_string(),
            resource_type: "tenant".to_string(),
            resource_id: auth.tenant_id.clone(),
            payload: json!({}),
        },
    );

    Ok(Json(json!({"reset": true, "tenant_id": auth.tenant_id})))
}
