use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use credo_core::did::build_did_document;
use credo_core::DocumentKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Authed;
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    pub id: Uuid,
    pub name: String,
    pub did: String,
    pub did_document: Value,
    pub did_document_url: String,
    pub created_at: DateTime<Utc>,
}

pub async fn create_agent(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<CreateAgentResponse>, ApiError> {
    auth.require_scopes(&["agents:create"])?;
    if req.name.is_empty() || req.name.len() > 200 {
        return Err(ApiError::Validation(
            "name must be between 1 and 200 characters".to_string(),
        ));
    }

    let (agent, key) = service::provision_agent(&state, &auth.tenant_id, &req.name)?;

    let document = build_did_document(
        &agent.did,
        &[DocumentKey {
            kid: key.kid,
            public_jwk: key.public_jwk,
        }],
    );
    let did_document_url = format!(
        "{}://{}/agents/{}/did.json",
        state.settings.scheme,
        state.settings.domain_decoded(),
        agent.id
    );

    Ok(Json(CreateAgentResponse {
        id: agent.id,
        name: agent.name,
        did: agent.did,
        did_document: serde_json::to_value(document).map_err(anyhow::Error::new)?,
        did_document_url,
        created_at: agent.created_at,
    }))
}
