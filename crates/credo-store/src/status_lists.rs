use credo_core::Bitstring;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::records::StatusListRecord;
use crate::store::{from_ms, now_ms, parse_uuid_col, Store};

pub(crate) const DEFAULT_LIST_SIZE: u32 = 16384;
pub(crate) const REVOCATION: &str = "revocation";

const LIST_COLS: &str = "id, tenant_id, purpose, bitstring, size, updated_at";

fn map_list_row(row: &Row<'_>) -> rusqlite::Result<StatusListRecord> {
    Ok(StatusListRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        tenant_id: row.get(1)?,
        purpose: row.get(2)?,
        bitstring: row.get(3)?,
        size: row.get::<_, i64>(4)? as u32,
        updated_at: from_ms(row.get(5)?),
    })
}

/// First revocation list for the tenant, created all-zero on demand.
pub(crate) fn get_or_create_default_tx(
    conn: &Connection,
    tenant_id: &str,
) -> rusqlite::Result<StatusListRecord> {
    let tenant_id = if tenant_id.is_empty() { "default" } else { tenant_id };

    let existing = conn
        .query_row(
            &format!(
                "SELECT {} FROM status_lists WHERE tenant_id = ?1 AND purpose = ?2
                 ORDER BY rowid ASC LIMIT 1",
                LIST_COLS
            ),
            params![tenant_id, REVOCATION],
            map_list_row,
        )
        .optional()?;
    if let Some(list) = existing {
        return Ok(list);
    }

    let id = Uuid::new_v4();
    let updated = now_ms();
    let bits = Bitstring::zeroed(DEFAULT_LIST_SIZE as usize);
    conn.execute(
        "INSERT INTO status_lists (id, tenant_id, purpose, bitstring, size, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            tenant_id,
            REVOCATION,
            bits.to_b64url(),
            DEFAULT_LIST_SIZE,
            updated
        ],
    )?;
    Ok(StatusListRecord {
        id,
        tenant_id: tenant_id.to_string(),
        purpose: REVOCATION.to_string(),
        bitstring: bits.to_b64url(),
        size: DEFAULT_LIST_SIZE,
        updated_at: from_ms(updated),
    })
}

pub(crate) fn get_list_tx(
    conn: &Connection,
    list_id: &Uuid,
) -> rusqlite::Result<Option<StatusListRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM status_lists WHERE id = ?1", LIST_COLS),
        params![list_id.to_string()],
        map_list_row,
    )
    .optional()
}

impl Store {
    pub fn get_or_create_default_list(&self, tenant_id: &str) -> StoreResult<StatusListRecord> {
        let conn = self.lock();
        Ok(get_or_create_default_tx(&conn, tenant_id)?)
    }

    /// Status lists are public documents; reads are unscoped.
    pub fn get_status_list(&self, list_id: &Uuid) -> StoreResult<Option<StatusListRecord>> {
        let conn = self.lock();
        Ok(get_list_tx(&conn, list_id)?)
    }

    /// Flip bit `index` to revoked. The read-modify-write runs in a
    /// transaction under the connection lock, so concurrent revocations of
    /// distinct indices both take effect. Setting a set bit is a no-op.
    pub fn set_revoked(&self, list_id: &Uuid, index: u32) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let list = get_list_tx(&tx, list_id)?.ok_or(StoreError::NotFound {
            resource: "Status list",
        })?;
        if index >= list.size {
            return Err(StoreError::IndexOutOfBounds {
                index,
                size: list.size,
            });
        }

        let mut bits = Bitstring::from_b64url(&list.bitstring)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        bits.set(index as usize).map_err(|_| StoreError::IndexOutOfBounds {
            index,
            size: list.size,
        })?;

        tx.execute(
            "UPDATE status_lists SET bitstring = ?1, updated_at = ?2 WHERE id = ?3",
            params![bits.to_b64url(), now_ms(), list_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Bounds-checked bit read; out-of-range indices read as not revoked.
    pub fn is_revoked(&self, list_id: &Uuid, index: u32) -> StoreResult<bool> {
        let conn = self.lock();
        let list = get_list_tx(&conn, list_id)?.ok_or(StoreError::NotFound {
            resource: "Status list",
        })?;
        let bits = Bitstring::from_b64url(&list.bitstring)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(bits.bit(index as usize))
    }
}
