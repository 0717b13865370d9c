//! Signed bitstring status-list credentials.
//!
//! A status list is published as a VC-JWT whose credential subject carries
//! the gzip-compressed, base64url-encoded bitstring. Consumers verify the
//! envelope signature against the issuer's DID document before trusting a
//! single bit.

use chrono::Utc;
use serde_json::{json, Map, Value};
use url::Url;
use uuid::Uuid;

use crate::bitstring::Bitstring;
use crate::error::{CoreError, CoreResult};
use crate::keys::SigningMaterial;
use crate::vc::{format_instant, verify_eddsa_jwt, DidResolver, STATUS_CONTEXT, VC_CONTEXT};

/// Public URL a tenant's status list is served from.
pub fn status_list_url(scheme: &str, domain_decoded: &str, list_id: &Uuid) -> String {
    format!("{}://{}/v1/status/{}", scheme, domain_decoded, list_id)
}

pub struct StatusListSignRequest<'a> {
    pub url: &'a str,
    pub purpose: &'a str,
    pub issuer_did: &'a str,
    pub bits: &'a Bitstring,
}

/// Wrap a bitstring in a signed `BitstringStatusListCredential` VC-JWT.
/// Returns the compact token and the embedded `vc` object.
pub fn issue_status_list_jwt(
    material: &SigningMaterial,
    req: StatusListSignRequest<'_>,
) -> CoreResult<(String, Value)> {
    let iat = Utc::now().timestamp();
    let subject_id = format!("{}#list", req.url);

    let vc = json!({
        "@context": [VC_CONTEXT, STATUS_CONTEXT],
        "type": ["VerifiableCredential", "BitstringStatusListCredential"],
        "id": req.url,
        "issuer": req.issuer_did,
        "validFrom": format_instant(iat),
        "credentialSubject": {
            "id": subject_id,
            "type": "BitstringStatusList",
            "statusPurpose": req.purpose,
            "encodedList": req.bits.encoded_list()?,
        },
    });

    let mut payload = Map::new();
    payload.insert("iss".to_string(), Value::String(req.issuer_did.to_string()));
    payload.insert("sub".to_string(), Value::String(subject_id));
    payload.insert(
        "jti".to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );
    payload.insert("iat".to_string(), Value::from(iat));
    payload.insert("vc".to_string(), vc.clone());

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::EdDSA);
    header.kid = Some(material.kid.clone());

    let token = jsonwebtoken::encode(&header, &Value::Object(payload), material.encoding_key())?;
    Ok((token, vc))
}

/// Verify a published status-list token and return the raw bitstring bytes
/// together with the verified payload.
pub async fn verify_and_extract(
    token: &str,
    resolver: &dyn DidResolver,
) -> CoreResult<(Vec<u8>, Value)> {
    let payload = verify_eddsa_jwt(token, resolver).await?;

    let encoded = payload
        .get("vc")
        .and_then(|vc| vc.get("credentialSubject"))
        .and_then(|cs| cs.get("encodedList"))
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::Validation("status list missing encodedList".to_string()))?;

    let raw = Bitstring::decode_encoded_list(encoded)?;
    Ok((raw, payload))
}

/// Whether a status-list URL points at this service (host:port match plus
/// the `/v1/status/` prefix), so the checker can shortcut to the database.
pub fn is_local_status_list_url(url: &str, local_hostport: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.authority() == local_hostport && parsed.path().starts_with("/v1/status/")
        }
        Err(_) => false,
    }
}

/// The list id is the final path segment of the status URL.
pub fn status_list_id_from_url(url: &str) -> CoreResult<Uuid> {
    let parsed =
        Url::parse(url).map_err(|e| CoreError::Validation(format!("invalid status URL: {}", e)))?;
    let last = parsed
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    Uuid::parse_str(last)
        .map_err(|_| CoreError::Validation("status URL has no list id".to_string()))
}
