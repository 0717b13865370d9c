use rusqlite::Connection;

/// Create every table and index. Idempotent; runs at startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            did TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agents_tenant ON agents(tenant_id);

        CREATE TABLE IF NOT EXISTS keys (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL REFERENCES agents(id),
            tenant_id TEXT NOT NULL DEFAULT 'default',
            kid TEXT NOT NULL UNIQUE,
            public_jwk TEXT NOT NULL,
            private_key_sealed TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            rotated_at INTEGER,
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_keys_agent ON keys(agent_id);
        CREATE INDEX IF NOT EXISTS idx_keys_tenant ON keys(tenant_id);

        CREATE TABLE IF NOT EXISTS status_lists (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            purpose TEXT NOT NULL DEFAULT 'revocation',
            bitstring TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 16384,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_status_lists_tenant ON status_lists(tenant_id);

        CREATE TABLE IF NOT EXISTS credentials (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            issuer_agent_id TEXT NOT NULL REFERENCES agents(id),
            subject_did TEXT NOT NULL,
            credential_type TEXT NOT NULL,
            jti TEXT NOT NULL UNIQUE,
            jwt TEXT NOT NULL,
            status_list_id TEXT NOT NULL REFERENCES status_lists(id),
            status_list_index INTEGER NOT NULL,
            issued_at INTEGER NOT NULL,
            expires_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_credentials_tenant ON credentials(tenant_id);

        CREATE TABLE IF NOT EXISTS audit_events (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            event_type TEXT NOT NULL,
            actor TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_tenant_created
            ON audit_events(tenant_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS requirement_intents (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            status TEXT NOT NULL DEFAULT 'requires_confirmation',
            subject_did TEXT,
            issuer_name TEXT,
            subject_name TEXT,
            requirements TEXT NOT NULL,
            options TEXT NOT NULL,
            metadata TEXT NOT NULL,
            idempotency_key TEXT,
            request_hash TEXT,
            confirm_idempotency_key TEXT,
            confirm_request_hash TEXT,
            decision TEXT NOT NULL,
            proof_bundle TEXT NOT NULL,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_intents_tenant ON requirement_intents(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_intents_idem
            ON requirement_intents(tenant_id, idempotency_key);
        ",
    )
}
