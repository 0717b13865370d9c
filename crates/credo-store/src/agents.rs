use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::keys::insert_key_tx;
use crate::records::{AgentRecord, KeyRecord, NewKey};
use crate::store::{from_ms, now_ms, parse_uuid_col, Store};
use crate::tenants::ensure_tenant_tx;

pub(crate) fn map_agent_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        did: row.get(2)?,
        tenant_id: row.get(3)?,
        created_at: from_ms(row.get(4)?),
    })
}

const AGENT_COLS: &str = "id, name, did, tenant_id, created_at";

pub(crate) fn insert_agent_tx(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    did: &str,
    tenant_id: &str,
) -> rusqlite::Result<AgentRecord> {
    let created = now_ms();
    conn.execute(
        "INSERT INTO agents (id, name, did, tenant_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id.to_string(), name, did, tenant_id, created],
    )?;
    Ok(AgentRecord {
        id: *id,
        name: name.to_string(),
        did: did.to_string(),
        tenant_id: tenant_id.to_string(),
        created_at: from_ms(created),
    })
}

impl Store {
    /// Insert an agent together with its first key, atomically.
    pub fn create_agent_with_key(
        &self,
        tenant_id: &str,
        agent_id: &Uuid,
        name: &str,
        did: &str,
        key: NewKey,
    ) -> StoreResult<(AgentRecord, KeyRecord)> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_tenant_tx(&tx, tenant_id)?;
        let agent = insert_agent_tx(&tx, agent_id, name, did, tenant_id)?;
        let key = insert_key_tx(&tx, agent_id, tenant_id, &key, true)?;
        tx.commit()?;
        Ok((agent, key))
    }

    /// Tenant-scoped lookup; an agent belonging to another tenant is
    /// indistinguishable from one that does not exist.
    pub fn get_agent(&self, tenant_id: &str, agent_id: &Uuid) -> StoreResult<Option<AgentRecord>> {
        let conn = self.lock();
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?1 AND tenant_id = ?2", AGENT_COLS),
                params![agent_id.to_string(), tenant_id],
                map_agent_row,
            )
            .optional()?;
        Ok(agent)
    }

    /// Unscoped lookup used by the public DID-document routes.
    pub fn get_agent_unscoped(&self, agent_id: &Uuid) -> StoreResult<Option<AgentRecord>> {
        let conn = self.lock();
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLS),
                params![agent_id.to_string()],
                map_agent_row,
            )
            .optional()?;
        Ok(agent)
    }

    pub fn get_agent_by_did(&self, did: &str) -> StoreResult<Option<AgentRecord>> {
        let conn = self.lock();
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE did = ?1", AGENT_COLS),
                params![did],
                map_agent_row,
            )
            .optional()?;
        Ok(agent)
    }
}
