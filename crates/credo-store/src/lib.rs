//! SQLite persistence for the credo authority.
//!
//! Every read-modify-write on a status list happens inside a transaction
//! while holding the single connection lock, which is what stands in for
//! row-level locking here: two revocations of distinct indices both land,
//! and index allocation commits atomically with the credential row that
//! reserves it.

mod agents;
mod audit;
mod credentials;
mod error;
mod intents;
mod keys;
mod records;
mod schema;
mod status_lists;
mod store;
mod tenants;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::{IssueCredentialArgs, SignedCredential};
pub use error::{StoreError, StoreResult};
pub use records::{
    AgentRecord, AuditEventRecord, AuditFilter, CredentialRecord, IntentRecord, IntentStatus,
    KeyRecord, NewAuditEvent, NewIntent, NewKey, StatusListRecord,
};
pub use store::Store;
