use credo_core::Bitstring;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::records::CredentialRecord;
use crate::status_lists::get_or_create_default_tx;
use crate::store::{from_ms, parse_uuid_col, Store};
use crate::tenants::ensure_tenant_tx;

const CRED_COLS: &str = "id, tenant_id, issuer_agent_id, subject_did, credential_type, jti, jwt, \
                         status_list_id, status_list_index, issued_at, expires_at";

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<CredentialRecord> {
    Ok(CredentialRecord {
        id: parse_uuid_col(&row.get::<_, String>(0)?)?,
        tenant_id: row.get(1)?,
        issuer_agent_id: parse_uuid_col(&row.get::<_, String>(2)?)?,
        subject_did: row.get(3)?,
        credential_type: row.get(4)?,
        jti: row.get(5)?,
        jwt: row.get(6)?,
        status_list_id: parse_uuid_col(&row.get::<_, String>(7)?)?,
        status_list_index: row.get::<_, i64>(8)? as u32,
        issued_at: from_ms(row.get(9)? ),
        expires_at: row.get::<_, Option<i64>>(10)?.map(from_ms),
    })
}

pub struct IssueCredentialArgs<'a> {
    pub tenant_id: &'a str,
    pub issuer_agent_id: &'a Uuid,
    pub subject_did: &'a str,
    pub credential_type: &'a str,
}

/// What the signing closure hands back once it has the allocated index.
pub struct SignedCredential {
    pub jwt: String,
    pub jti: String,
    pub iat: i64,
    pub exp: Option<i64>,
}

impl Store {
    /// Allocate the next free status-list index and persist the credential
    /// that reserves it, in one transaction. The closure signs the VC for
    /// the allocated `(list, index)` pair; if it fails, nothing commits and
    /// the index stays free.
    pub fn issue_credential(
        &self,
        args: IssueCredentialArgs<'_>,
        sign: impl FnOnce(&crate::records::StatusListRecord, u32) -> Result<SignedCredential, String>,
    ) -> StoreResult<CredentialRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_tenant_tx(&tx, args.tenant_id)?;

        let list = get_or_create_default_tx(&tx, args.tenant_id)?;
        let bits = Bitstring::from_b64url(&list.bitstring)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Allocation never flips a bit; an index counts as taken when its
        // bit is set or an existing credential row already reserves it.
        let mut stmt = tx.prepare(
            "SELECT status_list_index FROM credentials WHERE status_list_id = ?1",
        )?;
        let reserved = stmt
            .query_map(params![list.id.to_string()], |row| row.get::<_, i64>(0))?
            .collect::<Result<std::collections::HashSet<_>, _>>()?;
        drop(stmt);

        let index = (0..bits.len_bits())
            .find(|i| !bits.bit(*i) && !reserved.contains(&(*i as i64)))
            .ok_or(StoreError::StatusListFull)? as u32;

        let signed = sign(&list, index).map_err(StoreError::Signer)?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO credentials (id, tenant_id, issuer_agent_id, subject_did, credential_type,
                                      jti, jwt, status_list_id, status_list_index, issued_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                args.tenant_id,
                args.issuer_agent_id.to_string(),
                args.subject_did,
                args.credential_type,
                signed.jti,
                signed.jwt,
                list.id.to_string(),
                index,
                signed.iat * 1000,
                signed.exp.map(|e| e * 1000),
            ],
        )?;
        tx.commit()?;

        Ok(CredentialRecord {
            id,
            tenant_id: args.tenant_id.to_string(),
            issuer_agent_id: *args.issuer_agent_id,
            subject_did: args.subject_did.to_string(),
            credential_type: args.credential_type.to_string(),
            jti: signed.jti,
            jwt: signed.jwt,
            status_list_id: list.id,
            status_list_index: index,
            issued_at: from_ms(signed.iat * 1000),
            expires_at: signed.exp.map(|e| from_ms(e * 1000)),
        })
    }

    pub fn get_credential(
        &self,
        tenant_id: &str,
        credential_id: &Uuid,
    ) -> StoreResult<Option<CredentialRecord>> {
        let conn = self.lock();
        let cred = conn
            .query_row(
                &format!(
                    "SELECT {} FROM credentials WHERE id = ?1 AND tenant_id = ?2",
                    CRED_COLS
                ),
                params![credential_id.to_string(), tenant_id],
                map_credential_row,
            )
            .optional()?;
        Ok(cred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_key_fixture, test_store};
    use chrono::Utc;

    fn seeded_agent(store: &Store, tenant: &str) -> Uuid {
        let id = Uuid::new_v4();
        let did = format!("did:web:localhost%3A8080:agents:{}", id);
        store
            .create_agent_with_key(tenant, &id, "issuer", &did, new_key_fixture(&did, 1))
            .unwrap();
        id
    }

    fn fake_signer(jti: &str) -> impl FnOnce(&crate::records::StatusListRecord, u32) -> Result<SignedCredential, String> {
        let jti = jti.to_string();
        move |_list, _index| {
            Ok(SignedCredential {
                jwt: format!("header.payload.{}", jti),
                jti,
                iat: Utc::now().timestamp(),
                exp: None,
            })
        }
    }

    #[test]
    fn issuance_allocates_sequential_indices_without_flipping_bits() {
        let store = test_store();
        let issuer = seeded_agent(&store, "demo");

        let first = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                fake_signer("jti-1"),
            )
            .unwrap();
        let second = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                fake_signer("jti-2"),
            )
            .unwrap();

        assert_eq!(first.status_list_index, 0);
        assert_eq!(second.status_list_index, 1);
        assert_eq!(first.status_list_id, second.status_list_id);

        // Issuing reserves but never revokes.
        assert!(!store.is_revoked(&first.status_list_id, 0).unwrap());
        assert!(!store.is_revoked(&first.status_list_id, 1).unwrap());
    }

    #[test]
    fn signer_failure_rolls_back_allocation() {
        let store = test_store();
        let issuer = seeded_agent(&store, "demo");

        let err = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                |_, _| Err("no key".to_string()),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Signer(_)));

        // The index is still free for the next issuance.
        let next = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                fake_signer("jti-after-failure"),
            )
            .unwrap();
        assert_eq!(next.status_list_index, 0);
    }

    #[test]
    fn exhausted_list_reports_full() {
        let store = test_store();
        let issuer = seeded_agent(&store, "demo");
        let list = store.get_or_create_default_list("demo").unwrap();

        // Saturate the bitstring directly.
        {
            let conn = store.lock();
            let full = credo_core::codec::b64url(&vec![0xffu8; (list.size / 8) as usize]);
            conn.execute(
                "UPDATE status_lists SET bitstring = ?1 WHERE id = ?2",
                params![full, list.id.to_string()],
            )
            .unwrap();
        }

        let err = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                fake_signer("jti-full"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusListFull));
    }

    #[test]
    fn credentials_are_tenant_scoped() {
        let store = test_store();
        let issuer = seeded_agent(&store, "demo");
        let cred = store
            .issue_credential(
                IssueCredentialArgs {
                    tenant_id: "demo",
                    issuer_agent_id: &issuer,
                    subject_did: "did:web:example.com:subject:123",
                    credential_type: "AgentCredential",
                },
                fake_signer("jti-scope"),
            )
            .unwrap();

        assert!(store.get_credential("acme", &cred.id).unwrap().is_none());
        assert!(store.get_credential("demo", &cred.id).unwrap().is_some());
    }
}
