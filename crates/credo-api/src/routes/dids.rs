//! Public DID-document routes. These serve exactly what the local
//! resolver shortcut assembles, so remote and local verification agree.

use axum::extract::{Path, State};
use axum::Json;
use credo_core::did::{build_did_document, status_issuer_did, DidDocument, DocumentKey};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

fn document_for_agent(state: &AppState, agent: &credo_store::AgentRecord) -> Result<DidDocument, ApiError> {
    let keys = state.store.keys_for_agent(&agent.id)?;
    if keys.is_empty() {
        return Err(ApiError::NotFound("Key"));
    }
    let doc_keys: Vec<DocumentKey> = keys
        .into_iter()
        .map(|k| DocumentKey {
            kid: k.kid,
            public_jwk: k.public_jwk,
        })
        .collect();
    Ok(build_did_document(&agent.did, &doc_keys))
}

pub async fn agent_did_document(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<DidDocument>, ApiError> {
    let agent = state
        .store
        .get_agent_unscoped(&agent_id)?
        .ok_or(ApiError::NotFound("Agent"))?;
    Ok(Json(document_for_agent(&state, &agent)?))
}

/// Path form of a did:web id, e.g. `localhost%3A8080/agents/<uuid>/did.json`.
pub async fn did_document_by_path(
    State(state): State<AppState>,
    Path(did_path): Path<String>,
) -> Result<Json<DidDocument>, ApiError> {
    let did_path = did_path
        .strip_suffix("/did.json")
        .unwrap_or(did_path.as_str());

    // The router percent-decodes the path, so a port's ':' must go back to
    // its did:web form before the lookup.
    let mut segments = did_path.splitn(2, '/');
    let domain = segments.next().unwrap_or_default().replace(':', "%3A");
    let rest = segments.next().unwrap_or_default();
    let did = if rest.is_empty() {
        format!("did:web:{}", domain)
    } else {
        format!("did:web:{}:{}", domain, rest.replace('/', ":"))
    };

    let agent = state
        .store
        .get_agent_by_did(&did)?
        .ok_or(ApiError::NotFound("DID"))?;
    Ok(Json(document_for_agent(&state, &agent)?))
}

/// The status-list issuer's document, served from the service root.
pub async fn well_known_did_document(
    State(state): State<AppState>,
) -> Result<Json<DidDocument>, ApiError> {
    let did = status_issuer_did(&state.settings.domain);
    let agent = state
        .store
        .get_agent_by_did(&did)?
        .ok_or(ApiError::NotFound("DID"))?;
    Ok(Json(document_for_agent(&state, &agent)?))
}
