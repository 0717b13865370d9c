//! The in-process DID resolver and status checker.
//!
//! DIDs under the service's own domain resolve straight from the database;
//! anything else is fetched over HTTP with a bounded timeout. The status
//! checker signs local lists on the fly and always verifies the envelope
//! before reading bits, local or not.

use std::sync::Arc;

use async_trait::async_trait;
use credo_core::did::{build_did_document, did_web_domain, did_web_to_url, DidDocument, DocumentKey};
use credo_core::error::{CoreError, CoreResult};
use credo_core::status::{is_local_status_list_url, status_list_id_from_url, verify_and_extract};
use credo_core::vc::{DidResolver, StatusChecker};
use credo_core::Kms;
use credo_store::Store;
use serde_json::Value;

use crate::service;
use crate::settings::Settings;
use crate::state::AppState;

pub struct AppResolver {
    store: Arc<Store>,
    http: reqwest::Client,
    domain: String,
    scheme: String,
}

impl AppResolver {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            http: state.http.clone(),
            domain: state.settings.domain.clone(),
            scheme: state.settings.scheme.clone(),
        }
    }
}

fn resolution(err: impl std::fmt::Display) -> CoreError {
    CoreError::Resolution(err.to_string())
}

#[async_trait]
impl DidResolver for AppResolver {
    async fn resolve(&self, did: &str) -> CoreResult<DidDocument> {
        if did_web_domain(did) == Some(self.domain.as_str()) {
            let agent = self
                .store
                .get_agent_by_did(did)
                .map_err(resolution)?
                .ok_or_else(|| CoreError::Resolution(format!("DID not found: {}", did)))?;
            let keys = self.store.keys_for_agent(&agent.id).map_err(resolution)?;
            if keys.is_empty() {
                return Err(CoreError::Resolution(format!("no keys for DID: {}", did)));
            }
            let doc_keys: Vec<DocumentKey> = keys
                .into_iter()
                .map(|k| DocumentKey {
                    kid: k.kid,
                    public_jwk: k.public_jwk,
                })
                .collect();
            return Ok(build_did_document(&agent.did, &doc_keys));
        }

        let url = did_web_to_url(did, &self.scheme)?;
        tracing::debug!(%did, %url, "resolving remote DID");
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(resolution)?
            .error_for_status()
            .map_err(resolution)?;
        response.json::<DidDocument>().await.map_err(resolution)
    }
}

pub struct AppStatusChecker {
    store: Arc<Store>,
    kms: Arc<dyn Kms>,
    settings: Arc<Settings>,
    http: reqwest::Client,
}

impl AppStatusChecker {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            kms: state.kms.clone(),
            settings: state.settings.clone(),
            http: state.http.clone(),
        }
    }
}

#[async_trait]
impl StatusChecker for AppStatusChecker {
    async fn is_revoked(&self, url: &str, index: u64) -> CoreResult<bool> {
        let token = if is_local_status_list_url(url, &self.settings.domain_decoded()) {
            let list_id = status_list_id_from_url(url)?;
            let (jwt, _) =
                service::sign_status_list(&self.store, self.kms.as_ref(), &self.settings, &list_id)
                    .map_err(resolution)?;
            jwt
        } else {
            let data: Value = self
                .http
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(resolution)?
                .error_for_status()
                .map_err(resolution)?
                .json()
                .await
                .map_err(resolution)?;
            data.get("jwt")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CoreError::Validation("status list response missing jwt".to_string())
                })?
                .to_string()
        };

        let resolver = AppResolver {
            store: self.store.clone(),
            http: self.http.clone(),
            domain: self.settings.domain.clone(),
            scheme: self.settings.scheme.clone(),
        };
        let (raw, _) = verify_and_extract(&token, &resolver).await?;

        let index = index as usize;
        if index >= raw.len() * 8 {
            return Ok(false);
        }
        Ok(raw[index / 8] & (1 << (index % 8)) != 0)
    }
}
