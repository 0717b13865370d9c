//! Shared operations behind the routes: agent provisioning, credential
//! issuance, status-list signing, and the composite verify verdict.

use credo_core::did;
use credo_core::keys::{generate_ed25519, SigningMaterial};
use credo_core::status::{self, StatusListSignRequest};
use credo_core::vc::{self, IssueParams};
use credo_core::{Bitstring, Kms};
use credo_store::{
    AgentRecord, CredentialRecord, IssueCredentialArgs, KeyRecord, NewAuditEvent, NewKey,
    SignedCredential, Store,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::resolver::{AppResolver, AppStatusChecker};
use crate::settings::Settings;
use crate::state::AppState;

pub const STATUS_ISSUER_NAME: &str = "__status_list_issuer__";

/// Generate and seal a fresh Ed25519 key for `kid`.
fn sealed_key(kms: &dyn Kms, kid: String) -> Result<NewKey, String> {
    let generated = generate_ed25519();
    let sealed = kms
        .seal(&generated.private_pkcs8_der)
        .map_err(|e| e.to_string())?;
    Ok(NewKey {
        kid,
        public_jwk: generated.public_jwk,
        private_key_sealed: sealed,
    })
}

/// Create an agent plus its first key under the caller's tenant.
pub fn provision_agent(
    state: &AppState,
    tenant_id: &str,
    name: &str,
) -> Result<(AgentRecord, KeyRecord), ApiError> {
    let agent_id = Uuid::new_v4();
    let agent_did = did::agent_did(&state.settings.domain, &agent_id);
    let key = sealed_key(state.kms.as_ref(), format!("{}#key-1", agent_did))
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
    Ok(state
        .store
        .create_agent_with_key(tenant_id, &agent_id, name, &agent_did, key)?)
}

/// The lazily-materialized status-list issuer: `did:web:<domain>`, upserted
/// transactionally on every use.
pub fn ensure_status_issuer(
    store: &Store,
    kms: &dyn Kms,
    domain: &str,
) -> Result<(AgentRecord, KeyRecord), ApiError> {
    let issuer_did = did::status_issuer_did(domain);
    let kid = format!("{}#key-1", issuer_did);
    Ok(store.ensure_status_issuer(&issuer_did, STATUS_ISSUER_NAME, || {
        sealed_key(kms, kid)
    })?)
}

/// Unseal an agent's signing key into usable material.
pub fn signing_material(state: &AppState, agent_id: &Uuid) -> Result<SigningMaterial, ApiError> {
    let key = state
        .store
        .signing_key_for_agent(agent_id)?
        .ok_or(ApiError::NotFound("Key"))?;
    let der = state.kms.unseal(&key.private_key_sealed)?;
    Ok(SigningMaterial::from_pkcs8_der(key.kid, &der))
}

/// Sign the current bitstring of a status list as a VC-JWT.
pub fn sign_status_list(
    store: &Store,
    kms: &dyn Kms,
    settings: &Settings,
    list_id: &Uuid,
) -> Result<(String, Value), ApiError> {
    let list = store
        .get_status_list(list_id)?
        .ok_or(ApiError::NotFound("Status list"))?;
    let bits = Bitstring::from_b64url(&list.bitstring)?;

    let (issuer, issuer_key) = ensure_status_issuer(store, kms, &settings.domain)?;
    let der = kms.unseal(&issuer_key.private_key_sealed)?;
    let material = SigningMaterial::from_pkcs8_der(issuer_key.kid, &der);

    let url = status::status_list_url(&settings.scheme, &settings.domain_decoded(), list_id);
    Ok(status::issue_status_list_jwt(
        &material,
        StatusListSignRequest {
            url: &url,
            purpose: &list.purpose,
            issuer_did: &issuer.did,
            bits: &bits,
        },
    )?)
}

/// Allocate a status index, sign the VC, and persist the credential row,
/// all inside one store transaction.
pub fn issue_credential(
    state: &AppState,
    tenant_id: &str,
    issuer: &AgentRecord,
    subject_did: &str,
    credential_type: &str,
    ttl_seconds: Option<i64>,
    extra_claims: Option<&Map<String, Value>>,
) -> Result<CredentialRecord, ApiError> {
    let material = signing_material(state, &issuer.id)?;
    let scheme = state.settings.scheme.clone();
    let domain = state.settings.domain_decoded();

    let credential = state.store.issue_credential(
        IssueCredentialArgs {
            tenant_id,
            issuer_agent_id: &issuer.id,
            subject_did,
            credential_type,
        },
        |list, index| {
            let url = status::status_list_url(&scheme, &domain, &list.id);
            let issued = vc::issue_vc_jwt(
                &material,
                IssueParams {
                    issuer_did: &issuer.did,
                    subject_did,
                    credential_type,
                    status_list_url: &url,
                    status_list_index: index,
                    ttl_seconds,
                    extra_claims,
                },
            )
            .map_err(|e| e.to_string())?;
            Ok(SignedCredential {
                jwt: issued.jwt,
                jti: issued.jti,
                iat: issued.iat,
                exp: issued.exp,
            })
        },
    )?;
    Ok(credential)
}

/// Verify a VC-JWT end to end and compose the public verdict. Fails
/// closed: every error on any step surfaces as an error, never as a
/// verified result.
pub async fn verify_with_status(state: &AppState, token: &str) -> Result<Value, ApiError> {
    let resolver = AppResolver::from_state(state);
    let checker = AppStatusChecker::from_state(state);
    let result = vc::verify_vc_jwt(token, &resolver, &checker).await?;

    let revoked = result.status.present && result.status.revoked == Some(true);
    let mut verdict = json!({
        "payload": result.payload,
        "status": result.status,
    });
    if revoked {
        verdict["verified"] = json!(false);
        verdict["reason"] = json!("revoked");
    } else {
        verdict["verified"] = json!(true);
    }
    Ok(verdict)
}

/// Fire-and-record audit write; failures are logged, never fatal to the
/// request that produced them.
pub fn audit(state: &AppState, event: NewAuditEvent) {
    if let Err(err) = state.store.append_audit(event) {
        tracing::warn!(error = %err, "audit write failed");
    }
}

/// Public URL a tenant's default status list is served from.
pub fn default_status_list_url(settings: &Settings, list_id: &Uuid) -> String {
    status::status_list_url(&settings.scheme, &settings.domain_decoded(), list_id)
}
