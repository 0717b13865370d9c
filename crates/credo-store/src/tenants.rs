use rusqlite::{params, Connection};

use crate::error::StoreResult;
use crate::store::{now_ms, Store};

/// Create the tenant row if it does not exist yet. Tenants materialize
/// lazily on their first scoped write.
pub(crate) fn ensure_tenant_tx(conn: &Connection, tenant_id: &str) -> rusqlite::Result<()> {
    let tenant_id = if tenant_id.is_empty() { "default" } else { tenant_id };
    conn.execute(
        "INSERT OR IGNORE INTO tenants (id, created_at) VALUES (?1, ?2)",
        params![tenant_id, now_ms()],
    )?;
    Ok(())
}

impl Store {
    pub fn ensure_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        let conn = self.lock();
        ensure_tenant_tx(&conn, tenant_id)?;
        Ok(())
    }

    /// Delete every row owned by a tenant, in foreign-key order. The
    /// status-list issuer lives under its own DID outside any tenant scope
    /// and is re-materialized lazily, never from a cached handle.
    pub fn reset_tenant(&self, tenant_id: &str) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM credentials WHERE tenant_id = ?1", params![tenant_id])?;
        tx.execute("DELETE FROM keys WHERE tenant_id = ?1", params![tenant_id])?;
        tx.execute("DELETE FROM agents WHERE tenant_id = ?1", params![tenant_id])?;
        tx.execute("DELETE FROM status_lists WHERE tenant_id = ?1", params![tenant_id])?;
        tx.execute(
            "DELETE FROM requirement_intents WHERE tenant_id = ?1",
            params![tenant_id],
        )?;
        tx.execute("DELETE FROM audit_events WHERE tenant_id = ?1", params![tenant_id])?;
        tx.execute("DELETE FROM tenants WHERE id = ?1", params![tenant_id])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_tenant_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_tenant("acme").unwrap();
        store.ensure_tenant("acme").unwrap();
        let conn = store.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tenants WHERE id = 'acme'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn empty_tenant_falls_back_to_default() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_tenant("").unwrap();
        let conn = store.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tenants WHERE id = 'default'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
