//! VC-JWT issuance and verification.
//!
//! Verification is polymorphic over two capabilities: a [`DidResolver`]
//! turning an issuer DID into a document, and a [`StatusChecker`] answering
//! whether a status-list bit is set. The in-process service wires these to
//! the local database; the portable verifier wires them to plain HTTPS.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::codec::b64url_decode;
use crate::error::{CoreError, CoreResult};
use crate::keys::{decoding_key_from_jwk, SigningMaterial};

pub const VC_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";
pub const STATUS_CONTEXT: &str = "https://www.w3.org/ns/credentials/status/v1";

/// Resolve a DID to its document.
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> CoreResult<crate::did::DidDocument>;
}

/// Answer whether bit `index` of the status list published at `url` is set.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn is_revoked(&self, url: &str, index: u64) -> CoreResult<bool>;
}

pub struct IssueParams<'a> {
    pub issuer_did: &'a str,
    pub subject_did: &'a str,
    pub credential_type: &'a str,
    pub status_list_url: &'a str,
    pub status_list_index: u32,
    pub ttl_seconds: Option<i64>,
    pub extra_claims: Option<&'a Map<String, Value>>,
}

pub struct IssuedVc {
    pub jwt: String,
    pub jti: String,
    pub iat: i64,
    pub exp: Option<i64>,
}

/// Revocation status attached to a verification result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialStatus {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct VerifiedVc {
    pub payload: Value,
    pub status: CredentialStatus,
}

/// ISO-8601 UTC instant without subseconds, as `validFrom` wants it.
pub fn format_instant(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

/// Sign a credential as a compact EdDSA VC-JWT.
pub fn issue_vc_jwt(material: &SigningMaterial, params: IssueParams<'_>) -> CoreResult<IssuedVc> {
    let jti = Uuid::new_v4().to_string();
    let iat = Utc::now().timestamp();
    let exp = params.ttl_seconds.map(|ttl| iat + ttl);

    let mut subject = Map::new();
    subject.insert("id".to_string(), Value::String(params.subject_did.to_string()));
    if let Some(extra) = params.extra_claims {
        for (k, v) in extra {
            subject.insert(k.clone(), v.clone());
        }
    }

    let vc = json!({
        "@context": [VC_CONTEXT],
        "type": ["VerifiableCredential", params.credential_type],
        "issuer": params.issuer_did,
        "validFrom": format_instant(iat),
        "credentialSubject": Value::Object(subject),
        "credentialStatus": {
            "id": format!("{}#{}", params.status_list_url, params.status_list_index),
            "type": "BitstringStatusListEntry",
            "statusPurpose": "revocation",
            "statusListIndex": params.status_list_index.to_string(),
            "statusListCredential": params.status_list_url,
        },
    });

    let mut payload = Map::new();
    payload.insert("iss".to_string(), Value::String(params.issuer_did.to_string()));
    payload.insert("sub".to_string(), Value::String(params.subject_did.to_string()));
    payload.insert("jti".to_string(), Value::String(jti.clone()));
    payload.insert("iat".to_string(), Value::from(iat));
    if let Some(exp) = exp {
        payload.insert("exp".to_string(), Value::from(exp));
    }
    payload.insert("vc".to_string(), vc);

    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(material.kid.clone());

    let jwt = encode(&header, &Value::Object(payload), material.encoding_key())?;
    Ok(IssuedVc { jwt, jti, iat, exp })
}

/// Decode the payload segment without any verification. Used only to learn
/// the issuer before the real check.
pub fn decode_payload_unverified(token: &str) -> CoreResult<Value> {
    let payload_b64 = token
        .split('.')
        .nth(1)
        .ok_or_else(|| CoreError::Validation("malformed JWT".to_string()))?;
    Ok(serde_json::from_slice(&b64url_decode(payload_b64)?)?)
}

/// Resolve the issuer of `token` and verify its EdDSA signature against the
/// issuer's DID document. Only `alg: EdDSA` passes; HS256, RS256 and
/// `none` are rejected before any signature math.
pub async fn verify_eddsa_jwt(token: &str, resolver: &dyn DidResolver) -> CoreResult<Value> {
    let header = decode_header(token)?;
    let unverified = decode_payload_unverified(token)?;

    let issuer = unverified
        .get("iss")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::Validation("Missing iss".to_string()))?;

    let doc = resolver.resolve(issuer).await?;
    let method = doc
        .select_method(header.kid.as_deref())
        .ok_or_else(|| CoreError::Validation("No verification method".to_string()))?;
    let key = decoding_key_from_jwk(&method.public_key_jwk)?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let payload = decode::<Value>(token, &key, &validation)?.claims;

    if let Some(exp) = payload.get("exp").and_then(Value::as_i64) {
        if exp < Utc::now().timestamp() {
            return Err(CoreError::Validation("token expired".to_string()));
        }
    }

    Ok(payload)
}

/// Full credential verification: signature against the resolved issuer
/// document, required claims, then the status-list lookup when the VC
/// carries a `credentialStatus` entry.
pub async fn verify_vc_jwt(
    token: &str,
    resolver: &dyn DidResolver,
    status_checker: &dyn StatusChecker,
) -> CoreResult<VerifiedVc> {
    let payload = verify_eddsa_jwt(token, resolver).await?;

    for claim in ["iss", "sub", "iat", "jti"] {
        if payload.get(claim).is_none() {
            return Err(CoreError::Validation(format!("Missing claim: {}", claim)));
        }
    }

    let mut status = CredentialStatus {
        present: false,
        revoked: None,
    };

    let entry = payload.get("vc").and_then(|vc| vc.get("credentialStatus"));
    if let Some(entry) = entry {
        let url = entry.get("statusListCredential").and_then(Value::as_str);
        let index = entry.get("statusListIndex").map(parse_index).transpose()?;
        if let (Some(url), Some(index)) = (url, index) {
            status.present = true;
            let revoked = match index {
                // A negative index can never address a bit; not revoked.
                i if i < 0 => false,
                i => status_checker.is_revoked(url, i as u64).await?,
            };
            status.revoked = Some(revoked);
        }
    }

    Ok(VerifiedVc { payload, status })
}

fn parse_index(value: &Value) -> CoreResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| CoreError::Validation("invalid statusListIndex".to_string())),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| CoreError::Validation("invalid statusListIndex".to_string())),
        _ => Err(CoreError::Validation("invalid statusListIndex".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{build_did_document, DidDocument, DocumentKey};
    use crate::keys::generate_ed25519;

    struct FixedResolver {
        doc: DidDocument,
    }

    #[async_trait]
    impl DidResolver for FixedResolver {
        async fn resolve(&self, _did: &str) -> CoreResult<DidDocument> {
            Ok(self.doc.clone())
        }
    }

    struct FixedChecker {
        revoked: bool,
    }

    #[async_trait]
    impl StatusChecker for FixedChecker {
        async fn is_revoked(&self, _url: &str, _index: u64) -> CoreResult<bool> {
            Ok(self.revoked)
        }
    }

    fn issuer_fixture() -> (SigningMaterial, FixedResolver, String) {
        let did = "did:web:example.com:agents:issuer".to_string();
        let kid = format!("{}#key-1", did);
        let key = generate_ed25519();
        let material = SigningMaterial::from_pkcs8_der(kid.clone(), &key.private_pkcs8_der);
        let doc = build_did_document(
            &did,
            &[DocumentKey {
                kid,
                public_jwk: key.public_jwk,
            }],
        );
        (material, FixedResolver { doc }, did)
    }

    fn issue_fixture_vc(material: &SigningMaterial, issuer_did: &str) -> IssuedVc {
        issue_vc_jwt(
            material,
            IssueParams {
                issuer_did,
                subject_did: "did:web:example.com:subject:123",
                credential_type: "CapabilityCredential",
                status_list_url: "https://example.com/v1/status/list-1",
                status_list_index: 7,
                ttl_seconds: Some(3600),
                extra_claims: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn issue_then_verify() {
        let (material, resolver, did) = issuer_fixture();
        let issued = issue_fixture_vc(&material, &did);

        let result = verify_vc_jwt(&issued.jwt, &resolver, &FixedChecker { revoked: false })
            .await
            .unwrap();

        assert_eq!(result.payload["iss"], did);
        assert_eq!(result.payload["jti"], issued.jti);
        assert_eq!(
            result.status,
            CredentialStatus {
                present: true,
                revoked: Some(false)
            }
        );
        let vc = &result.payload["vc"];
        assert_eq!(vc["type"][1], "CapabilityCredential");
        assert_eq!(vc["credentialStatus"]["statusListIndex"], "7");
    }

    #[tokio::test]
    async fn revoked_bit_surfaces_in_status() {
        let (material, resolver, did) = issuer_fixture();
        let issued = issue_fixture_vc(&material, &did);

        let result = verify_vc_jwt(&issued.jwt, &resolver, &FixedChecker { revoked: true })
            .await
            .unwrap();
        assert_eq!(result.status.revoked, Some(true));
    }

    #[tokio::test]
    async fn extra_claims_merge_into_subject() {
        let (material, resolver, did) = issuer_fixture();
        let mut extra = Map::new();
        extra.insert("capability".to_string(), Value::String("search".to_string()));

        let issued = issue_vc_jwt(
            &material,
            IssueParams {
                issuer_did: &did,
                subject_did: "did:web:example.com:subject:123",
                credential_type: "CapabilityCredential",
                status_list_url: "https://example.com/v1/status/list-1",
                status_list_index: 0,
                ttl_seconds: None,
                extra_claims: Some(&extra),
            },
        )
        .unwrap();

        let result = verify_vc_jwt(&issued.jwt, &resolver, &FixedChecker { revoked: false })
            .await
            .unwrap();
        let subject = &result.payload["vc"]["credentialSubject"];
        assert_eq!(subject["id"], "did:web:example.com:subject:123");
        assert_eq!(subject["capability"], "search");
    }

    #[tokio::test]
    async fn hs256_token_rejected() {
        let (_, resolver, did) = issuer_fixture();

        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"iss": did, "sub": "s", "jti": "j", "iat": 0}),
            &jsonwebtoken::EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let err = verify_vc_jwt(&token, &resolver, &FixedChecker { revoked: false }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn alg_none_rejected() {
        let (_, resolver, _) = issuer_fixture();
        let header = crate::codec::b64url(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = crate::codec::b64url(br#"{"iss":"did:web:example.com"}"#);
        let token = format!("{}.{}.", header, payload);

        let err = verify_vc_jwt(&token, &resolver, &FixedChecker { revoked: false }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn tampered_signature_rejected() {
        let (material, resolver, did) = issuer_fixture();
        let issued = issue_fixture_vc(&material, &did);

        let mut tampered = issued.jwt.clone();
        let flip = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(flip);

        let err = verify_vc_jwt(&tampered, &resolver, &FixedChecker { revoked: false }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn missing_jti_rejected() {
        let (material, resolver, did) = issuer_fixture();

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(material.kid.clone());
        let token = encode(
            &header,
            &json!({"iss": did, "sub": "s", "iat": Utc::now().timestamp()}),
            material.encoding_key(),
        )
        .unwrap();

        let err = verify_vc_jwt(&token, &resolver, &FixedChecker { revoked: false }).await;
        assert!(matches!(err, Err(CoreError::Validation(ref m)) if m.contains("jti")));
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let (material, resolver, did) = issuer_fixture();

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(material.kid.clone());
        let iat = Utc::now().timestamp() - 7200;
        let token = encode(
            &header,
            &json!({"iss": did, "sub": "s", "jti": "j", "iat": iat, "exp": iat + 60}),
            material.encoding_key(),
        )
        .unwrap();

        let err = verify_vc_jwt(&token, &resolver, &FixedChecker { revoked: false }).await;
        assert!(matches!(err, Err(CoreError::Validation(ref m)) if m.contains("expired")));
    }

    #[tokio::test]
    async fn credential_without_status_reports_absent() {
        let (material, resolver, did) = issuer_fixture();

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(material.kid.clone());
        let token = encode(
            &header,
            &json!({
                "iss": did,
                "sub": "did:web:example.com:subject:123",
                "jti": "plain",
                "iat": Utc::now().timestamp(),
                "vc": {"@context": [VC_CONTEXT], "type": ["VerifiableCredential"]},
            }),
            material.encoding_key(),
        )
        .unwrap();

        let result = verify_vc_jwt(&token, &resolver, &FixedChecker { revoked: true })
            .await
            .unwrap();
        assert!(!result.status.present);
        assert_eq!(result.status.revoked, None);
    }
}
