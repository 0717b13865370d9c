//! Requirement intents: a Stripe-style two-phase lifecycle. Create records
//! the request under `requires_confirmation`. Confirm executes it
//! (provision issuer and subject, issue one credential per requirement,
//! verify each end to end) and lands on `succeeded` or `failed`. Both
//! phases replay under their own idempotency key.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use credo_core::canonical::request_hash;
use credo_store::{IntentRecord, IntentStatus, NewIntent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{idempotency_key, Authed};
use crate::service;
use crate::state::AppState;

fn default_requirement_type() -> String {
    "CapabilityCredential".to_string()
}

fn default_issuer_name() -> String {
    "issuer-agent".to_string()
}

fn default_subject_name() -> String {
    "subject-agent".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    #[serde(rename = "type", default = "default_requirement_type")]
    pub requirement_type: String,
    #[serde(default)]
    pub claims: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,
    #[serde(default = "default_subject_name")]
    pub subject_name: String,
    #[serde(default)]
    pub subject_did: Option<String>,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub options: serde_json::Map<String, Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

fn default_return_mode() -> String {
    "both".to_string()
}

fn default_confirm_ttl() -> i64 {
    3600
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmIntentRequest {
    #[serde(default = "default_return_mode")]
    pub return_mode: String,
    #[serde(default = "default_confirm_ttl")]
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub id: Uuid,
    pub status: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decision: Value,
    pub proof_bundle: Value,
}

impl From<IntentRecord> for IntentResponse {
    fn from(intent: IntentRecord) -> Self {
        Self {
            id: intent.id,
            status: intent.status.as_str().to_string(),
            tenant_id: intent.tenant_id,
            created_at: intent.created_at,
            updated_at: intent.updated_at,
            decision: intent.decision,
            proof_bundle: intent.proof_bundle,
        }
    }
}

fn validate_create(req: &CreateIntentRequest) -> Result<(), ApiError> {
    if req.requirements.is_empty() || req.requirements.len() > 25 {
        return Err(ApiError::Validation(
            "requirements must contain between 1 and 25 items".to_string(),
        ));
    }
    for requirement in &req.requirements {
        if requirement.id.is_empty() || requirement.id.len() > 80 {
            return Err(ApiError::Validation(
                "requirement id must be between 1 and 80 characters".to_string(),
            ));
        }
    }
    for name in [&req.issuer_name, &req.subject_name] {
        if name.is_empty() || name.len() > 200 {
            return Err(ApiError::Validation(
                "agent names must be between 1 and 200 characters".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn create_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Authed(auth): Authed,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<IntentResponse>, ApiError> {
    auth.require_scopes(&["credentials:issue"])?;
    validate_create(&req)?;

    let body = serde_json::to_value(&req).map_err(anyhow::Error::new)?;
    let hash = request_hash(&json!({"tenant_id": auth.tenant_id, "body": body}));
    let idem = idempotency_key(&headers);

    if let Some(key) = &idem {
        if let Some(existing) = state
            .store
            .find_intent_by_idempotency_key(&auth.tenant_id, key)?
        {
            // Key reuse with a different payload is an error, Stripe-style.
            if existing.request_hash.as_deref().is_some_and(|h| h != hash) {
                return Err(ApiError::IdempotencyConflict(
                    "Idempotency-Key reuse with different request".to_string(),
                ));
            }
            return Ok(Json(existing.into()));
        }
    }

    let intent = state.store.insert_intent(NewIntent {
        tenant_id: auth.tenant_id.clone(),
        subject_did: req.subject_did.clone(),
        issuer_name: req.issuer_name.clone(),
        subject_name: req.subject_name.clone(),
        requirements: json!({"items": body["requirements"]}),
        options: Value::Object(req.options.clone()),
        metadata: Value::Object(req.metadata.clone()),
        idempotency_key: idem,
        request_hash: hash,
    })?;

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: auth.tenant_id.clone(),
            event_type: "requirement_intent.created".to_string(),
            actor: "api".to_string(),
            resource_type: "requirement_intent".to_string(),
            resource_id: intent.id.to_string(),
            payload: json!({
                "status": intent.status.as_str(),
                "requirements_count": req.requirements.len(),
            }),
        },
    );

    Ok(Json(intent.into()))
}

pub async fn get_intent(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Path(intent_id): Path<Uuid>,
) -> Result<Json<IntentResponse>, ApiError> {
    auth.require_scopes(&["credentials:issue"])?;
    let intent = state
        .store
        .get_intent(&auth.tenant_id, &intent_id)?
        .ok_or(ApiError::NotFound("RequirementIntent"))?;
    Ok(Json(intent.into()))
}

pub async fn cancel_intent(
    State(state): State<AppState>,
    Authed(auth): Authed,
    Path(intent_id): Path<Uuid>,
) -> Result<Json<IntentResponse>, ApiError> {
    auth.require_scopes(&["credentials:issue"])?;
    let intent = state.store.cancel_intent(&auth.tenant_id, &intent_id)?;
    Ok(Json(intent.into()))
}

pub async fn confirm_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Authed(auth): Authed,
    Path(intent_id): Path<Uuid>,
    Json(req): Json<ConfirmIntentRequest>,
) -> Result<Json<IntentResponse>, ApiError> {
    auth.require_scopes(&["credentials:issue", "credentials:revoke"])?;

    if !matches!(req.return_mode.as_str(), "decision" | "bundle" | "both") {
        return Err(ApiError::Validation(
            "return_mode must be one of decision, bundle, both".to_string(),
        ));
    }
    if !(60..=31_536_000).contains(&req.ttl_seconds) {
        return Err(ApiError::Validation(
            "ttl_seconds must be between 60 and 31536000".to_string(),
        ));
    }

    let body = serde_json::to_value(&req).map_err(anyhow::Error::new)?;
    let hash = request_hash(&json!({
        "tenant_id": auth.tenant_id,
        "body": body,
        "intent_id": intent_id.to_string(),
    }));
    let idem = idempotency_key(&headers);

    let intent = state
        .store
        .get_intent(&auth.tenant_id, &intent_id)?
        .ok_or(ApiError::NotFound("RequirementIntent"))?;

    if let Some(key) = &idem {
        if intent.confirm_idempotency_key.as_deref() == Some(key.as_str()) {
            if intent
                .confirm_request_hash
                .as_deref()
                .is_some_and(|h| h != hash)
            {
                return Err(ApiError::IdempotencyConflict(
                    "Idempotency-Key reuse with different request".to_string(),
                ));
            }
            // Replay: return the stored outcome verbatim.
            return Ok(Json(intent.into()));
        }
    }

    state
        .store
        .mark_intent_processing(&auth.tenant_id, &intent_id, idem.as_deref(), &hash)?;

    let outcome = execute_confirmation(&state, &auth.tenant_id, &intent, &req).await;
    let finalized = match outcome {
        Ok((decision, proof_bundle)) => {
            let status = if decision["status"] == "satisfied" {
                IntentStatus::Succeeded
            } else {
                IntentStatus::Failed
            };
            let decision_out = match req.return_mode.as_str() {
                "decision" | "both" => decision,
                _ => json!({}),
            };
            let bundle_out = match req.return_mode.as_str() {
                "bundle" | "both" => proof_bundle,
                _ => json!({}),
            };
            state.store.finalize_intent(
                &auth.tenant_id,
                &intent_id,
                status,
                &decision_out,
                &bundle_out,
                None,
            )?
        }
        Err(err) => {
            tracing::warn!(intent = %intent_id, error = %err, "intent confirmation failed");
            state.store.finalize_intent(
                &auth.tenant_id,
                &intent_id,
                IntentStatus::Failed,
                &json!({}),
                &json!({}),
                Some(&err.to_string()),
            )?
        }
    };

    service::audit(
        &state,
        credo_store::NewAuditEvent {
            tenant_id: auth.tenant_id.clone(),
            event_type: "requirement_intent.confirmed".to_string(),
            actor: "api".to_string(),
            resource_type: "requirement_intent".to_string(),
            resource_id: intent_id.to_string(),
            payload: json!({
                "status": finalized.status.as_str(),
                "return_mode": req.return_mode,
            }),
        },
    );

    Ok(Json(finalized.into()))
}

/// One credential per requirement, each verified through the same status
/// checker the public verify path uses. Input order is preserved.
async fn execute_confirmation(
    state: &AppState,
    tenant_id: &str,
    intent: &IntentRecord,
    req: &ConfirmIntentRequest,
) -> Result<(Value, Value), ApiError> {
    let (issuer, _) = service::provision_agent(state, tenant_id, &intent.issuer_name)?;
    let (subject, _) = service::provision_agent(state, tenant_id, &intent.subject_name)?;
    let subject_did = intent
        .subject_did
        .clone()
        .unwrap_or_else(|| subject.did.clone());

    let items = intent
        .requirements
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut issued = Vec::with_capacity(items.len());
    let mut per_requirement = Vec::with_capacity(items.len());
    for item in &items {
        let requirement_id = item.get("id").and_then(Value::as_str).unwrap_or("req");
        let claims = item.get("claims").and_then(Value::as_object);

        let credential = service::issue_credential(
            state,
            tenant_id,
            &issuer,
            &subject_did,
            "CapabilityCredential",
            Some(req.ttl_seconds),
            claims,
        )?;
        let status_list_url =
            service::default_status_list_url(&state.settings, &credential.status_list_id);

        let verify = service::verify_with_status(state, &credential.jwt).await?;
        let satisfied = verify
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        per_requirement.push(json!({
            "id": requirement_id,
            "satisfied": satisfied,
            "reason": verify.get("reason"),
        }));
        issued.push(json!({
            "requirement_id": requirement_id,
            "credential_id": credential.id,
            "vc_jwt": credential.jwt,
            "status_list_url": status_list_url,
            "status_list_id": credential.status_list_id,
            "status_list_index": credential.status_list_index,
            "verify": verify,
        }));
    }

    let all_satisfied = per_requirement
        .iter()
        .all(|r| r["satisfied"] == json!(true));
    let decision = json!({
        "status": if all_satisfied { "satisfied" } else { "not_satisfied" },
        "requirements": per_requirement,
    });
    let proof_bundle = json!({
        "issuer_did": issuer.did,
        "subject_did": subject_did,
        "credentials": issued,
    });
    Ok((decision, proof_bundle))
}
