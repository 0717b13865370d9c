use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::records::{KeyRecord, NewKey};
use crate::store::{from_ms, now_ms, parse_json_col, parse_uuid_col, Store};
use crate::tenants::ensure_tenant_tx;

const KEY_COLS: &str =
    "id, agent_id, tenant_id, kid, public_jwk, private_key_sealed, created_at, rotated_at, active";

fn map_key_row(row: &Row<'_>) -> rusqlite::Result<KeyRecord> {
    Ok(KeyRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        agent_id: parse_uuid_col(&row.get::<_, String>(1)?)?,
        tenant_id: row.get(2)?,
        kid: row.get(3)?,
        public_jwk: parse_json_col(&row.get::<_, String>(4)?)?,
        private_key_sealed: row.get(5)?,
        created_at: from_ms(row.get(6)?),
        rotated_at: row.get::<_, Option<i64>>(7)?.map(from_ms),
        active: row.get(8)?,
    })
}

pub(crate) fn insert_key_tx(
    conn: &Connection,
    agent_id: &Uuid,
    tenant_id: &str,
    key: &NewKey,
    active: bool,
) -> rusqlite::Result<KeyRecord> {
    let id = Uuid::new_v4();
    let created = now_ms();
    let jwk_json = serde_json::to_string(&key.public_jwk)
        .map_err(crate::store::column_error)?;
    conn.execute(
        "INSERT INTO keys (id, agent_id, tenant_id, kid, public_jwk, private_key_sealed, created_at, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            agent_id.to_string(),
            tenant_id,
            key.kid,
            jwk_json,
            key.private_key_sealed,
            created,
            active
        ],
    )?;
    Ok(KeyRecord {
        id,
        agent_id: *agent_id,
        tenant_id: tenant_id.to_string(),
        kid: key.kid.clone(),
        public_jwk: key.public_jwk.clone(),
        private_key_sealed: key.private_key_sealed.clone(),
        created_at: from_ms(created),
        rotated_at: None,
        active,
    })
}

impl Store {
    /// Every key an agent has ever held, oldest first. Retired keys stay
    /// in the document so old credentials keep verifying.
    pub fn keys_for_agent(&self, agent_id: &Uuid) -> StoreResult<Vec<KeyRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM keys WHERE agent_id = ?1 ORDER BY created_at ASC, rowid ASC",
            KEY_COLS
        ))?;
        let keys = stmt
            .query_map(params![agent_id.to_string()], map_key_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// The key to sign with: the single active key, or the newest key when
    /// none is marked active.
    pub fn signing_key_for_agent(&self, agent_id: &Uuid) -> StoreResult<Option<KeyRecord>> {
        let conn = self.lock();
        let active = conn
            .query_row(
                &format!(
                    "SELECT {} FROM keys WHERE agent_id = ?1 AND active = 1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    KEY_COLS
                ),
                params![agent_id.to_string()],
                map_key_row,
            )
            .optional()?;
        if active.is_some() {
            return Ok(active);
        }
        let newest = conn
            .query_row(
                &format!(
                    "SELECT {} FROM keys WHERE agent_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    KEY_COLS
                ),
                params![agent_id.to_string()],
                map_key_row,
            )
            .optional()?;
        Ok(newest)
    }

    /// Deactivate the current active keys and append a fresh one, in one
    /// transaction. The closure receives the next key ordinal and the
    /// agent DID and returns the new key material.
    pub fn rotate_agent_key(
        &self,
        tenant_id: &str,
        agent_id: &Uuid,
        make_key: impl FnOnce(u32, &str) -> Result<NewKey, String>,
    ) -> StoreResult<KeyRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_tenant_tx(&tx, tenant_id)?;

        let did: String = tx
            .query_row(
                "SELECT did FROM agents WHERE id = ?1 AND tenant_id = ?2",
                params![agent_id.to_string(), tenant_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound { resource: "Agent" })?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM keys WHERE agent_id = ?1",
            params![agent_id.to_string()],
            |row| row.get(0),
        )?;
        if existing == 0 {
            return Err(StoreError::NotFound { resource: "Key" });
        }

        tx.execute(
            "UPDATE keys SET active = 0, rotated_at = ?1 WHERE agent_id = ?2 AND active = 1",
            params![now_ms(), agent_id.to_string()],
        )?;

        let new_key = make_key(existing as u32 + 1, &did).map_err(StoreError::Signer)?;
        let inserted = insert_key_tx(&tx, agent_id, tenant_id, &new_key, true)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Upsert the process-wide status-list issuer by its well-known DID.
    /// Looked up transactionally on every call so a tenant reset can never
    /// leave a stale handle behind.
    pub fn ensure_status_issuer(
        &self,
        did: &str,
        name: &str,
        make_key: impl FnOnce() -> Result<NewKey, String>,
    ) -> StoreResult<(crate::records::AgentRecord, KeyRecord)> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let agent = tx
            .query_row(
                "SELECT id, name, did, tenant_id, created_at FROM agents WHERE did = ?1",
                params![did],
                crate::agents::map_agent_row,
            )
            .optional()?;
        let agent = match agent {
            Some(agent) => agent,
            None => {
                let id = Uuid::new_v4();
                crate::agents::insert_agent_tx(&tx, &id, name, did, "default")?
            }
        };

        let key = tx
            .query_row(
                &format!(
                    "SELECT {} FROM keys WHERE agent_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    KEY_COLS
                ),
                params![agent.id.to_string()],
                map_key_row,
            )
            .optional()?;
        let key = match key {
            Some(key) => key,
            None => {
                let new_key = make_key().map_err(StoreError::Signer)?;
                insert_key_tx(&tx, &agent.id, "default", &new_key, true)?
            }
        };

        tx.commit()?;
        Ok((agent, key))
    }
}
