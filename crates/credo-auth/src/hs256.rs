//! Internal bearer tokens, HS256.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{json, Value};

use crate::error::AuthError;

/// Mint an internal token carrying scopes and a tenant claim.
pub fn issue_token(
    secret: &str,
    issuer: &str,
    subject: &str,
    scopes: &[String],
    tenant_id: &str,
    ttl_seconds: i64,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let payload = json!({
        "iss": issuer,
        "sub": subject,
        "iat": now,
        "exp": now + ttl_seconds,
        "scope": scopes,
        "tenant": tenant_id,
    });
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify an internal token: HS256 signature, issuer match, expiry, and the
/// presence of `iss`, `sub`, `iat`, `exp`.
pub fn verify_token(secret: &str, issuer: &str, token: &str) -> Result<Value, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    let claims = decode::<Value>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?
    .claims;

    for required in ["iss", "sub", "iat", "exp"] {
        if claims.get(required).is_none() {
            return Err(AuthError::Invalid(format!("missing claim: {}", required)));
        }
    }
    Ok(claims)
}

/// `scope` may be an array of strings or a single space-separated string.
pub fn extract_scopes(claims: &Value) -> HashSet<String> {
    match claims.get("scope") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => HashSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify() {
        let token = issue_token(
            "secret",
            "credo",
            "admin",
            &["credentials:issue".to_string()],
            "demo",
            3600,
        )
        .unwrap();

        let claims = verify_token("secret", "credo", &token).unwrap();
        assert_eq!(claims["sub"], "admin");
        assert_eq!(claims["tenant"], "demo");
        assert_eq!(
            extract_scopes(&claims),
            HashSet::from(["credentials:issue".to_string()])
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token("secret", "credo", "admin", &[], "default", 3600).unwrap();
        assert!(verify_token("other", "credo", &token).is_err());
    }

    #[test]
    fn wrong_issuer_rejected() {
        let token = issue_token("secret", "someone-else", "admin", &[], "default", 3600).unwrap();
        assert!(verify_token("secret", "credo", &token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let token = issue_token("secret", "credo", "admin", &[], "default", -120).unwrap();
        assert!(verify_token("secret", "credo", &token).is_err());
    }

    #[test]
    fn scope_string_form_splits() {
        let claims = serde_json::json!({"scope": "agents:create credentials:issue"});
        let scopes = extract_scopes(&claims);
        assert!(scopes.contains("agents:create"));
        assert!(scopes.contains("credentials:issue"));
        assert_eq!(scopes.len(), 2);
    }

    #[test]
    fn absent_scope_is_empty() {
        assert!(extract_scopes(&serde_json::json!({})).is_empty());
    }
}
