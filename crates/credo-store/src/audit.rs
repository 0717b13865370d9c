use rusqlite::{params_from_iter, Row};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::records::{AuditEventRecord, AuditFilter, NewAuditEvent};
use crate::store::{from_ms, now_ms, parse_json_col, parse_uuid_col, Store};
use crate::tenants::ensure_tenant_tx;

fn map_audit_row(row: &Row<'_>) -> rusqlite::Result<AuditEventRecord> {
    Ok(AuditEventRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        tenant_id: row.get(1)?,
        event_type: row.get(2)?,
        actor: row.get(3)?,
        resource_type: row.get(4)?,
        resource_id: row.get(5)?,
        payload: parse_json_col(&row.get::<_, String>(6)?)?,
        created_at: from_ms(row.get(7)?),
    })
}

impl Store {
    /// Append-only; events are never updated or deleted except by a
    /// tenant reset.
    pub fn append_audit(&self, event: NewAuditEvent) -> StoreResult<AuditEventRecord> {
        let tenant_id = if event.tenant_id.is_empty() {
            "default".to_string()
        } else {
            event.tenant_id
        };

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_tenant_tx(&tx, &tenant_id)?;

        let id = Uuid::new_v4();
        let created = now_ms();
        tx.execute(
            "INSERT INTO audit_events
               (id, tenant_id, event_type, actor, resource_type, resource_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id.to_string(),
                tenant_id,
                event.event_type,
                event.actor,
                event.resource_type,
                event.resource_id,
                serde_json::to_string(&event.payload)?,
                created,
            ],
        )?;
        tx.commit()?;

        Ok(AuditEventRecord {
            id,
            tenant_id,
            event_type: event.event_type.clone(),
            actor: event.actor,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            payload: event.payload,
            created_at: from_ms(created),
        })
    }

    /// Newest first, tenant-scoped, optionally including the shared
    /// `public` stream written by the open verify endpoint.
    pub fn list_audit(
        &self,
        tenant_id: &str,
        filter: &AuditFilter,
    ) -> StoreResult<Vec<AuditEventRecord>> {
        let mut sql = String::from(
            "SELECT id, tenant_id, event_type, actor, resource_type, resource_id, payload, created_at
             FROM audit_events WHERE ",
        );
        let mut args: Vec<String> = Vec::new();

        if filter.include_public {
            sql.push_str("tenant_id IN (?1, 'public')");
        } else {
            sql.push_str("tenant_id = ?1");
        }
        args.push(tenant_id.to_string());

        for (column, value) in [
            ("actor", &filter.actor),
            ("event_type", &filter.event_type),
            ("resource_type", &filter.resource_type),
            ("resource_id", &filter.resource_id),
        ] {
            if let Some(value) = value {
                args.push(value.clone());
                sql.push_str(&format!(" AND {} = ?{}", column, args.len()));
            }
        }

        let limit = filter.limit.clamp(1, 500);
        sql.push_str(&format!(" ORDER BY created_at DESC, rowid DESC LIMIT {}", limit));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(args.iter()), map_audit_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_store;
    use serde_json::json;

    fn event(tenant: &str, event_type: &str, actor: &str) -> NewAuditEvent {
        NewAuditEvent {
            tenant_id: tenant.to_string(),
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            resource_type: "credential".to_string(),
            resource_id: "res-1".to_string(),
            payload: json!({"k": "v"}),
        }
    }

    #[test]
    fn append_and_list_newest_first() {
        let store = test_store();
        store.append_audit(event("demo", "credential.issued", "api")).unwrap();
        store.append_audit(event("demo", "credential.revoked", "revoker")).unwrap();

        let events = store
            .list_audit(
                "demo",
                &AuditFilter {
                    limit: 50,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "credential.revoked");
        assert_eq!(events[1].event_type, "credential.issued");
    }

    #[test]
    fn listing_is_tenant_scoped() {
        let store = test_store();
        store.append_audit(event("demo", "credential.issued", "api")).unwrap();
        store.append_audit(event("acme", "credential.issued", "api")).unwrap();

        let events = store
            .list_audit(
                "demo",
                &AuditFilter {
                    limit: 50,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(events.iter().all(|e| e.tenant_id == "demo"));
    }

    #[test]
    fn include_public_merges_streams() {
        let store = test_store();
        store.append_audit(event("demo", "credential.issued", "api")).unwrap();
        store.append_audit(event("public", "credential.verified", "verifier")).unwrap();

        let without = store
            .list_audit(
                "demo",
                &AuditFilter {
                    limit: 50,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(without.len(), 1);

        let with = store
            .list_audit(
                "demo",
                &AuditFilter {
                    limit: 50,
                    include_public: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(with.len(), 2);
    }

    #[test]
    fn filters_apply() {
        let store = test_store();
        store.append_audit(event("demo", "credential.issued", "api")).unwrap();
        store.append_audit(event("demo", "credential.revoked", "revoker")).unwrap();

        let events = store
            .list_audit(
                "demo",
                &AuditFilter {
                    limit: 50,
                    event_type: Some("credential.revoked".to_string()),
                    actor: Some("revoker".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "credential.revoked");
    }
}
