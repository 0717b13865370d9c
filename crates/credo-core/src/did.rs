//! `did:web` identifiers and DID documents.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::keys::PublicJwk;

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const VERIFICATION_METHOD_TYPE: &str = "JsonWebKey2020";

/// Agent DID: `did:web:<domain>:agents:<uuid>`. The domain keeps its
/// percent-encoding (`:` in a port becomes `%3A`, per the did:web method).
pub fn agent_did(domain: &str, agent_id: &Uuid) -> String {
    format!("did:web:{}:agents:{}", domain, agent_id)
}

/// The status-list issuer signs with the bare service DID, `did:web:<domain>`.
pub fn status_issuer_did(domain: &str) -> String {
    format!("did:web:{}", domain)
}

/// Percent-decode a did:web domain (`localhost%3A8080` -> `localhost:8080`).
pub fn decode_domain(domain: &str) -> String {
    percent_decode_str(domain).decode_utf8_lossy().into_owned()
}

/// Map a did:web identifier to the URL its document is served from.
///
/// `did:web:<domain>` resolves to `/.well-known/did.json`; identifiers with
/// path segments resolve to `/<segments>/did.json`.
pub fn did_web_to_url(did: &str, scheme: &str) -> CoreResult<String> {
    let rest = did
        .strip_prefix("did:web:")
        .ok_or_else(|| CoreError::Validation("Only did:web supported".to_string()))?;

    let mut parts = rest.split(':');
    let domain = parts
        .next()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| CoreError::Validation("Invalid did:web".to_string()))?;
    let domain = decode_domain(domain);

    let segments: Vec<String> = parts.map(decode_domain).collect();
    if segments.is_empty() {
        Ok(format!("{}://{}/.well-known/did.json", scheme, domain))
    } else {
        Ok(format!(
            "{}://{}/{}/did.json",
            scheme,
            domain,
            segments.join("/")
        ))
    }
}

/// The domain segment of a did:web identifier, still percent-encoded.
pub fn did_web_domain(did: &str) -> Option<&str> {
    did.strip_prefix("did:web:")
        .and_then(|rest| rest.split(':').next())
        .filter(|d| !d.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(rename = "publicKeyJwk")]
    pub public_key_jwk: PublicJwk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "verificationMethod", default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default)]
    pub authentication: Vec<String>,
    #[serde(rename = "assertionMethod", default)]
    pub assertion_method: Vec<String>,
}

impl DidDocument {
    /// Pick the verification method matching `kid`, falling back to the
    /// first listed method when no id matches.
    pub fn select_method(&self, kid: Option<&str>) -> Option<&VerificationMethod> {
        if let Some(kid) = kid {
            if let Some(vm) = self.verification_method.iter().find(|m| m.id == kid) {
                return Some(vm);
            }
        }
        self.verification_method.first()
    }
}

/// One key as it appears in a DID document.
#[derive(Debug, Clone)]
pub struct DocumentKey {
    pub kid: String,
    pub public_jwk: PublicJwk,
}

/// Assemble a DID document listing every key as a verification method,
/// referenced from both `authentication` and `assertionMethod`.
pub fn build_did_document(did: &str, keys: &[DocumentKey]) -> DidDocument {
    let kids: Vec<String> = keys.iter().map(|k| k.kid.clone()).collect();
    let methods = keys
        .iter()
        .map(|k| VerificationMethod {
            id: k.kid.clone(),
            method_type: VERIFICATION_METHOD_TYPE.to_string(),
            controller: did.to_string(),
            public_key_jwk: k.public_jwk.clone(),
        })
        .collect();

    DidDocument {
        context: vec![DID_CONTEXT.to_string()],
        id: did.to_string(),
        verification_method: methods,
        authentication: kids.clone(),
        assertion_method: kids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_ed25519;

    #[test]
    fn agent_did_shape() {
        let id = Uuid::new_v4();
        let did = agent_did("localhost%3A8080", &id);
        assert_eq!(did, format!("did:web:localhost%3A8080:agents:{}", id));
    }

    #[test]
    fn bare_domain_maps_to_well_known() {
        let url = did_web_to_url("did:web:example.com", "https").unwrap();
        assert_eq!(url, "https://example.com/.well-known/did.json");
    }

    #[test]
    fn port_is_percent_decoded() {
        let url = did_web_to_url("did:web:localhost%3A8080", "http").unwrap();
        assert_eq!(url, "http://localhost:8080/.well-known/did.json");
    }

    #[test]
    fn path_segments_join_with_slashes() {
        let url = did_web_to_url("did:web:example.com:agents:abc-123", "https").unwrap();
        assert_eq!(url, "https://example.com/agents/abc-123/did.json");
    }

    #[test]
    fn non_web_method_rejected() {
        assert!(did_web_to_url("did:key:z6Mk", "https").is_err());
        assert!(did_web_to_url("did:web:", "https").is_err());
    }

    #[test]
    fn document_lists_every_key() {
        let k1 = generate_ed25519();
        let k2 = generate_ed25519();
        let did = "did:web:example.com:agents:a";
        let doc = build_did_document(
            did,
            &[
                DocumentKey {
                    kid: format!("{}#key-1", did),
                    public_jwk: k1.public_jwk,
                },
                DocumentKey {
                    kid: format!("{}#key-2", did),
                    public_jwk: k2.public_jwk,
                },
            ],
        );

        assert_eq!(doc.id, did);
        assert_eq!(doc.context, vec![DID_CONTEXT.to_string()]);
        assert_eq!(doc.verification_method.len(), 2);
        assert_eq!(doc.authentication.len(), 2);
        assert_eq!(doc.assertion_method, doc.authentication);
        assert_eq!(doc.verification_method[0].method_type, "JsonWebKey2020");
        assert_eq!(doc.verification_method[0].controller, did);
    }

    #[test]
    fn select_method_prefers_kid_then_first() {
        let key = generate_ed25519();
        let did = "did:web:example.com:agents:a";
        let doc = build_did_document(
            did,
            &[
                DocumentKey {
                    kid: format!("{}#key-1", did),
                    public_jwk: key.public_jwk.clone(),
                },
                DocumentKey {
                    kid: format!("{}#key-2", did),
                    public_jwk: key.public_jwk,
                },
            ],
        );

        let picked = doc.select_method(Some(&format!("{}#key-2", did))).unwrap();
        assert!(picked.id.ends_with("#key-2"));
        let fallback = doc.select_method(Some("no-such-kid")).unwrap();
        assert!(fallback.id.ends_with("#key-1"));
        assert!(doc.select_method(None).unwrap().id.ends_with("#key-1"));
    }
}
