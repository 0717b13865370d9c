//! Shared fixtures for store tests.

use credo_core::keys::generate_ed25519;

use crate::records::NewKey;
use crate::store::Store;

pub(crate) fn test_store() -> Store {
    Store::open_in_memory().unwrap()
}

/// A fresh Ed25519 key row for tests. The private half is stored base64
/// encoded rather than sealed; sealing belongs to the caller in production.
pub(crate) fn new_key_fixture(did: &str, ordinal: u32) -> NewKey {
    let generated = generate_ed25519();
    NewKey {
        kid: format!("{}#key-{}", did, ordinal),
        public_jwk: generated.public_jwk,
        private_key_sealed: credo_core::codec::b64url(&generated.private_pkcs8_der),
    }
}
