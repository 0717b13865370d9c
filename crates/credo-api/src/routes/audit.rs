use axum::extract::{Query, State};
use axum::Json;
use credo_store::AuditFilter;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_public: bool,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

pub async fn list_audit_events(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["tenant:admin"])?;

    let events = state.store.list_audit(
        &auth.tenant_id,
        &AuditFilter {
            limit: query.limit,
            include_public: query.include_public,
            actor: query.actor,
            event_type: query.event_type,
            resource_type: query.resource_type,
            resource_id: query.resource_id,
        },
    )?;

    let events: Vec<Value> = events
        .into_iter()
        .map(|e| {
            json!({
                "id": e.id,
                "event_type": e.event_type,
                "actor": e.actor,
                "resource_type": e.resource_type,
                "resource_id": e.resource_id,
                "payload": e.payload,
                "created_at": e.created_at,
            })
        })
        .collect();

    Ok(Json(json!({"events": events})))
}
