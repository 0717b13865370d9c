use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::records::{IntentRecord, IntentStatus, NewIntent};
use crate::store::{from_ms, now_ms, parse_json_col, parse_uuid_col, Store};
use crate::tenants::ensure_tenant_tx;

const INTENT_COLS: &str = "id, tenant_id, status, subject_did, issuer_name, subject_name, \
                           requirements, options, metadata, idempotency_key, request_hash, \
                           confirm_idempotency_key, confirm_request_hash, decision, proof_bundle, \
                           last_error, created_at, updated_at";

fn map_intent_row(row: &Row<'_>) -> rusqlite::Result<IntentRecord> {
    let status: String = row.get(2)?;
    Ok(IntentRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        tenant_id: row.get(1)?,
        status: IntentStatus::parse(&status).ok_or_else(|| {
            crate::store::column_error(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown intent status {}", status),
            ))
        })?,
        subject_did: row.get(3)?,
        issuer_name: row.get(4)?,
        subject_name: row.get(5)?,
        requirements: parse_json_col(&row.get::<_, String>(6)?)?,
        options: parse_json_col(&row.get::<_, String>(7)?)?,
        metadata: parse_json_col(&row.get::<_, String>(8)?)?,
        idempotency_key: row.get(9)?,
        request_hash: row.get(10)?,
        confirm_idempotency_key: row.get(11)?,
        confirm_request_hash: row.get(12)?,
        decision: parse_json_col(&row.get::<_, String>(13)?)?,
        proof_bundle: parse_json_col(&row.get::<_, String>(14)?)?,
        last_error: row.get(15)?,
        created_at: from_ms(row.get(16)?),
        updated_at: from_ms(row.get(17)?),
    })
}

impl Store {
    pub fn insert_intent(&self, new: NewIntent) -> StoreResult<IntentRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_tenant_tx(&tx, &new.tenant_id)?;

        let id = Uuid::new_v4();
        let now = now_ms();
        tx.execute(
            "INSERT INTO requirement_intents
               (id, tenant_id, status, subject_did, issuer_name, subject_name, requirements,
                options, metadata, idempotency_key, request_hash, decision, proof_bundle,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, '{}', '{}', ?12, ?12)",
            params![
                id.to_string(),
                new.tenant_id,
                IntentStatus::RequiresConfirmation.as_str(),
                new.subject_did,
                new.issuer_name,
                new.subject_name,
                serde_json::to_string(&new.requirements)?,
                serde_json::to_string(&new.options)?,
                serde_json::to_string(&new.metadata)?,
                new.idempotency_key,
                new.request_hash,
                now,
            ],
        )?;
        tx.commit()?;
        drop(conn);

        self.get_intent(&new.tenant_id, &id)?
            .ok_or(StoreError::NotFound {
                resource: "RequirementIntent",
            })
    }

    pub fn get_intent(&self, tenant_id: &str, id: &Uuid) -> StoreResult<Option<IntentRecord>> {
        let conn = self.lock();
        let intent = conn
            .query_row(
                &format!(
                    "SELECT {} FROM requirement_intents WHERE id = ?1 AND tenant_id = ?2",
                    INTENT_COLS
                ),
                params![id.to_string(), tenant_id],
                map_intent_row,
            )
            .optional()?;
        Ok(intent)
    }

    pub fn find_intent_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> StoreResult<Option<IntentRecord>> {
        let conn = self.lock();
        let intent = conn
            .query_row(
                &format!(
                    "SELECT {} FROM requirement_intents
                     WHERE tenant_id = ?1 AND idempotency_key = ?2",
                    INTENT_COLS
                ),
                params![tenant_id, key],
                map_intent_row,
            )
            .optional()?;
        Ok(intent)
    }

    /// Transition to `processing`, persisting the confirm idempotency pair.
    pub fn mark_intent_processing(
        &self,
        tenant_id: &str,
        id: &Uuid,
        confirm_key: Option<&str>,
        confirm_hash: &str,
    ) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE requirement_intents
             SET status = ?1, confirm_idempotency_key = ?2, confirm_request_hash = ?3, updated_at = ?4
             WHERE id = ?5 AND tenant_id = ?6",
            params![
                IntentStatus::Processing.as_str(),
                confirm_key,
                confirm_hash,
                now_ms(),
                id.to_string(),
                tenant_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                resource: "RequirementIntent",
            });
        }
        Ok(())
    }

    /// Persist the terminal outcome of a confirmation.
    pub fn finalize_intent(
        &self,
        tenant_id: &str,
        id: &Uuid,
        status: IntentStatus,
        decision: &Value,
        proof_bundle: &Value,
        last_error: Option<&str>,
    ) -> StoreResult<IntentRecord> {
        let conn = self.lock();
        conn.execute(
            "UPDATE requirement_intents
             SET status = ?1, decision = ?2, proof_bundle = ?3, last_error = ?4, updated_at = ?5
             WHERE id = ?6 AND tenant_id = ?7",
            params![
                status.as_str(),
                serde_json::to_string(decision)?,
                serde_json::to_string(proof_bundle)?,
                last_error,
                now_ms(),
                id.to_string(),
                tenant_id
            ],
        )?;
        drop(conn);
        self.get_intent(tenant_id, id)?.ok_or(StoreError::NotFound {
            resource: "RequirementIntent",
        })
    }

    /// Cancel a non-terminal intent. Terminal intents are returned
    /// untouched; their `updated_at` never moves again.
    pub fn cancel_intent(&self, tenant_id: &str, id: &Uuid) -> StoreResult<IntentRecord> {
        let intent = self.get_intent(tenant_id, id)?.ok_or(StoreError::NotFound {
            resource: "RequirementIntent",
        })?;
        if intent.status.is_terminal() {
            return Ok(intent);
        }

        let conn = self.lock();
        conn.execute(
            "UPDATE requirement_intents SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND tenant_id = ?4",
            params![
                IntentStatus::Canceled.as_str(),
                now_ms(),
                id.to_string(),
                tenant_id
            ],
        )?;
        drop(conn);
        self.get_intent(tenant_id, id)?.ok_or(StoreError::NotFound {
            resource: "RequirementIntent",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_store;
    use serde_json::json;

    fn new_intent(tenant: &str, key: Option<&str>) -> NewIntent {
        NewIntent {
            tenant_id: tenant.to_string(),
            subject_did: None,
            issuer_name: "issuer-agent".to_string(),
            subject_name: "subject-agent".to_string(),
            requirements: json!({"items": [{"id": "r1", "type": "CapabilityCredential", "claims": {}}]}),
            options: json!({}),
            metadata: json!({}),
            idempotency_key: key.map(str::to_string),
            request_hash: "hash-1".to_string(),
        }
    }

    #[test]
    fn insert_and_fetch() {
        let store = test_store();
        let intent = store.insert_intent(new_intent("demo", Some("k1"))).unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresConfirmation);
        assert_eq!(intent.decision, json!({}));
        assert_eq!(intent.proof_bundle, json!({}));

        let found = store
            .find_intent_by_idempotency_key("demo", "k1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, intent.id);
        assert_eq!(found.request_hash.as_deref(), Some("hash-1"));

        // Other tenants cannot see it.
        assert!(store.get_intent("acme", &intent.id).unwrap().is_none());
        assert!(store
            .find_intent_by_idempotency_key("acme", "k1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn processing_then_finalize() {
        let store = test_store();
        let intent = store.insert_intent(new_intent("demo", None)).unwrap();

        store
            .mark_intent_processing("demo", &intent.id, Some("ck"), "confirm-hash")
            .unwrap();
        let processing = store.get_intent("demo", &intent.id).unwrap().unwrap();
        assert_eq!(processing.status, IntentStatus::Processing);
        assert_eq!(processing.confirm_idempotency_key.as_deref(), Some("ck"));
        assert_eq!(processing.confirm_request_hash.as_deref(), Some("confirm-hash"));

        let done = store
            .finalize_intent(
                "demo",
                &intent.id,
                IntentStatus::Succeeded,
                &json!({"status": "satisfied", "requirements": []}),
                &json!({"credentials": []}),
                None,
            )
            .unwrap();
        assert_eq!(done.status, IntentStatus::Succeeded);
        assert_eq!(done.decision["status"], "satisfied");
    }

    #[test]
    fn cancel_is_noop_on_terminal() {
        let store = test_store();
        let intent = store.insert_intent(new_intent("demo", None)).unwrap();
        let done = store
            .finalize_intent(
                "demo",
                &intent.id,
                IntentStatus::Succeeded,
                &json!({}),
                &json!({}),
                None,
            )
            .unwrap();

        let canceled = store.cancel_intent("demo", &intent.id).unwrap();
        assert_eq!(canceled.status, IntentStatus::Succeeded);
        assert_eq!(canceled.updated_at, done.updated_at);
    }

    #[test]
    fn cancel_transitions_non_terminal() {
        let store = test_store();
        let intent = store.insert_intent(new_intent("demo", None)).unwrap();
        let canceled = store.cancel_intent("demo", &intent.id).unwrap();
        assert_eq!(canceled.status, IntentStatus::Canceled);
    }
}
