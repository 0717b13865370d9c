use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

fn default_format() -> String {
    "vc-jwt".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

/// Public status-list endpoint: the signed VC-JWT envelope by default, the
/// raw stored row with `?format=raw`.
pub async fn get_status_list(
    State(state): State<AppState>,
    Path(status_list_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    match query.format.as_str() {
        "raw" => {
            let list = state
                .store
                .get_status_list(&status_list_id)?
                .ok_or(ApiError::NotFound("Status list"))?;
            Ok(Json(json!({
                "id": list.id,
                "purpose": list.purpose,
                "size": list.size,
                "bitstring": list.bitstring,
                "updated_at": list.updated_at,
            })))
        }
        "vc-jwt" => {
            let (jwt, credential) = service::sign_status_list(
                &state.store,
                state.kms.as_ref(),
                &state.settings,
                &status_list_id,
            )?;
            Ok(Json(json!({"jwt": jwt, "credential": credential})))
        }
        other => Err(ApiError::Validation(format!("unsupported format: {}", other))),
    }
}
