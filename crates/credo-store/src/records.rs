//! Row types handed across the store boundary.

use chrono::{DateTime, Utc};
use credo_core::keys::PublicJwk;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: Uuid,
    pub name: String,
    pub did: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub tenant_id: String,
    pub kid: String,
    pub public_jwk: PublicJwk,
    pub private_key_sealed: String,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Material for a key row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewKey {
    pub kid: String,
    pub public_jwk: PublicJwk,
    pub private_key_sealed: String,
}

#[derive(Debug, Clone)]
pub struct StatusListRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub purpose: String,
    pub bitstring: String,
    pub size: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub issuer_agent_id: Uuid,
    pub subject_did: String,
    pub credential_type: String,
    pub jti: String,
    pub jwt: String,
    pub status_list_id: Uuid,
    pub status_list_index: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuditEventRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub event_type: String,
    pub actor: String,
    pub resource_type: String,
    pub resource_id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub tenant_id: String,
    pub event_type: String,
    pub actor: String,
    pub resource_type: String,
    pub resource_id: String,
    pub payload: Value,
}

/// Query filters for the audit log listing.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub limit: u32,
    pub include_public: bool,
    pub actor: Option<String>,
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
            IntentStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requires_confirmation" => Some(IntentStatus::RequiresConfirmation),
            "processing" => Some(IntentStatus::Processing),
            "succeeded" => Some(IntentStatus::Succeeded),
            "failed" => Some(IntentStatus::Failed),
            "canceled" => Some(IntentStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Succeeded | IntentStatus::Failed | IntentStatus::Canceled
        )
    }
}

#[derive(Debug, Clone)]
pub struct IntentRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub status: IntentStatus,
    pub subject_did: Option<String>,
    pub issuer_name: String,
    pub subject_name: String,
    pub requirements: Value,
    pub options: Value,
    pub metadata: Value,
    pub idempotency_key: Option<String>,
    pub request_hash: Option<String>,
    pub confirm_idempotency_key: Option<String>,
    pub confirm_request_hash: Option<String>,
    pub decision: Value,
    pub proof_bundle: Value,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIntent {
    pub tenant_id: String,
    pub subject_did: Option<String>,
    pub issuer_name: String,
    pub subject_name: String,
    pub requirements: Value,
    pub options: Value,
    pub metadata: Value,
    pub idempotency_key: Option<String>,
    pub request_hash: String,
}
