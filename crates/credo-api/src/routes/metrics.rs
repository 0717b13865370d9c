use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;

pub async fn snapshot(
    State(state): State<AppState>,
    Authed(auth): Authed,
) -> Result<Json<Value>, ApiError> {
    auth.require_scopes(&["tenant:admin"])?;
    Ok(Json(state.metrics.snapshot()))
}
