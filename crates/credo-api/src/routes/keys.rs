use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;

pub async fn rotate(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["tenant:admin"])?;

    let kms = state.kms.clone();
    let new_key = state
        .store
        .rotate_agent_key(&auth.tenant_id, &agent_id, move |ordinal, did| {
            let generated = credo_core::keys::generate_ed25519();
            let sealed = kms
                .seal(&generated.private_pkcs8_der)
                .map_err(|e| e.to_string())?;
            Ok(credo_store::NewKey {
                kid: format!("{}#key-{}", did, ordinal),
                public_jwk: generated.public_jwk,
                private_key_sealed: sealed,
            })
        })?;

    Ok(Json(json!({
        "rotated": true,
        "agent_id": agent_id,
        "new_kid": new_key.kid,
    })))
}
