//! External OIDC verification: RS256 against the provider's JWKS.
//!
//! The JWKS comes from a URL (fetched and cached) or inline JSON for tests
//! and air-gapped setups. Scopes follow Keycloak conventions; the tenant
//! comes from a `/tenants/<id>` group membership.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::AuthError;

const JWKS_REFRESH: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default)]
pub struct OidcConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    pub jwks_json: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksKey {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Jwks {
    pub keys: Vec<JwksKey>,
}

pub struct OidcVerifier {
    config: OidcConfig,
    http: reqwest::Client,
    cache: RwLock<Option<(Instant, Jwks)>>,
}

impl OidcVerifier {
    pub fn new(config: OidcConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            cache: RwLock::new(None),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Value, AuthError> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("missing kid".to_string()))?;

        let jwks = self.load_jwks().await?;
        let key = jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid.as_str()))
            .ok_or_else(|| AuthError::Invalid("kid not found in JWKS".to_string()))?;
        if key.kty != "RSA" {
            return Err(AuthError::Invalid(format!("unsupported kty: {}", key.kty)));
        }

        let decoding = DecodingKey::from_rsa_components(&key.n, &key.e)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[self.config.audience.as_str()]);
        }

        let claims = decode::<Value>(token, &decoding, &validation)?.claims;
        for required in ["iss", "sub", "iat", "exp"] {
            if claims.get(required).is_none() {
                return Err(AuthError::Invalid(format!("missing claim: {}", required)));
            }
        }
        Ok(claims)
    }

    async fn load_jwks(&self) -> Result<Jwks, AuthError> {
        if !self.config.jwks_json.is_empty() {
            return serde_json::from_str(&self.config.jwks_json)
                .map_err(|e| AuthError::Config(format!("bad OIDC_JWKS_JSON: {}", e)));
        }
        if self.config.jwks_url.is_empty() {
            return Err(AuthError::Config(
                "neither OIDC_JWKS_URL nor OIDC_JWKS_JSON configured".to_string(),
            ));
        }

        if let Some((fetched_at, jwks)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < JWKS_REFRESH {
                return Ok(jwks.clone());
            }
        }

        let jwks: Jwks = self
            .http
            .get(&self.config.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AuthError::Config(format!("JWKS fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AuthError::Config(format!("JWKS fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Config(format!("JWKS parse failed: {}", e)))?;

        tracing::debug!(url = %self.config.jwks_url, keys = jwks.keys.len(), "refreshed JWKS");
        *self.cache.write().await = Some((Instant::now(), jwks.clone()));
        Ok(jwks)
    }
}

/// Keycloak-style scopes: realm roles, client roles for the configured
/// client, and the RFC `scope` string all land in one flat set.
pub fn extract_scopes_keycloak(claims: &Value, client_id: Option<&str>) -> HashSet<String> {
    let mut scopes = HashSet::new();

    if let Some(roles) = claims
        .pointer("/realm_access/roles")
        .and_then(Value::as_array)
    {
        scopes.extend(roles.iter().filter_map(Value::as_str).map(str::to_string));
    }

    if let Some(client_id) = client_id {
        if let Some(roles) = claims
            .pointer(&format!("/resource_access/{}/roles", client_id))
            .and_then(Value::as_array)
        {
            scopes.extend(roles.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }

    if let Some(scope) = claims.get("scope").and_then(Value::as_str) {
        scopes.extend(scope.split_whitespace().map(str::to_string));
    }

    scopes
}

/// Tenant from a `/tenants/<id>` group membership.
pub fn extract_tenant_from_groups(claims: &Value) -> Option<String> {
    let groups = claims.get("groups")?.as_array()?;
    for group in groups.iter().filter_map(Value::as_str) {
        if let Some(rest) = group.strip_prefix("/tenants/") {
            let tenant = rest.trim_matches('/');
            if !tenant.is_empty() {
                return Some(tenant.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn realm_and_client_roles_merge() {
        let claims = json!({
            "realm_access": {"roles": ["credentials:issue", "offline_access"]},
            "resource_access": {"credo": {"roles": ["tenant:admin"]}},
            "scope": "openid profile",
        });

        let scopes = extract_scopes_keycloak(&claims, Some("credo"));
        assert!(scopes.contains("credentials:issue"));
        assert!(scopes.contains("tenant:admin"));
        assert!(scopes.contains("openid"));

        // Without the client id, client roles stay out.
        let scopes = extract_scopes_keycloak(&claims, None);
        assert!(!scopes.contains("tenant:admin"));
    }

    #[test]
    fn tenant_comes_from_groups() {
        let claims = json!({"groups": ["/other/x", "/tenants/acme"]});
        assert_eq!(extract_tenant_from_groups(&claims).as_deref(), Some("acme"));

        assert_eq!(extract_tenant_from_groups(&json!({"groups": []})), None);
        assert_eq!(extract_tenant_from_groups(&json!({})), None);
        assert_eq!(
            extract_tenant_from_groups(&json!({"groups": ["/tenants/"]})),
            None
        );
    }
}
