pub mod agents;
pub mod audit;
pub mod auth;
pub mod credentials;
pub mod dids;
pub mod health;
pub mod intents;
pub mod keys;
pub mod metrics;
pub mod revoke;
pub mod status;
pub mod tenants;
pub mod verify;
pub mod workflows;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware as mw;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/agents", post(agents::create_agent))
        .route("/v1/agents/:agent_id/keys/rotate", post(keys::rotate))
        .route("/v1/credentials/issue", post(credentials::issue))
        .route("/v1/credentials/:credential_id/revoke", post(revoke::revoke))
        .route("/v1/credentials/verify", post(verify::verify))
        .route("/v1/status/:status_list_id", get(status::get_status_list))
        .route("/v1/requirement_intents", post(intents::create_intent))
        .route("/v1/requirement_intents/:intent_id", get(intents::get_intent))
        .route(
            "/v1/requirement_intents/:intent_id/confirm",
            post(intents::confirm_intent),
        )
        .route(
            "/v1/requirement_intents/:intent_id/cancel",
            post(intents::cancel_intent),
        )
        .route("/v1/workflows/lifecycle-demo", post(workflows::lifecycle_demo))
        .route("/v1/audit", get(audit::list_audit_events))
        .route("/v1/auth/dev-token", post(auth::dev_token))
        .route("/v1/metrics", get(metrics::snapshot))
        .route("/v1/tenant/reset", post(tenants::reset))
        .route("/agents/:agent_id/did.json", get(dids::agent_did_document))
        .route("/v1/dids/*did_path", get(dids::did_document_by_path))
        .route("/.well-known/did.json", get(dids::well_known_did_document));

    let mut router = router
        .layer(DefaultBodyLimit::max(state.settings.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), mw::record_metrics))
        .layer(from_fn_with_state(state.clone(), mw::rate_limit))
        .layer(from_fn_with_state(state.clone(), mw::body_limit));

    if state.settings.cors_enabled {
        let origins: Vec<HeaderValue> = state
            .settings
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(mw::request_id))
        .with_state(state)
}
