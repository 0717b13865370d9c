use std::collections::HashSet;

use serde_json::Value;

use crate::error::AuthError;
use crate::hs256;
use crate::oidc::{self, OidcConfig, OidcVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Hs256,
    Oidc,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub hs256_secret: String,
    pub hs256_issuer: String,
    pub oidc: OidcConfig,
}

/// The identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Value,
    pub scopes: HashSet<String>,
    pub tenant_id: String,
}

impl AuthContext {
    pub fn require_scopes(&self, required: &[&str]) -> Result<(), AuthError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|s| !self.scopes.contains(**s))
            .map(|s| s.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::ScopeInsufficient { missing })
        }
    }
}

/// Verifies bearer tokens according to the configured mode and builds the
/// request's [`AuthContext`].
pub struct Authenticator {
    config: AuthConfig,
    oidc: OidcVerifier,
}

impl Authenticator {
    pub fn new(config: AuthConfig, http: reqwest::Client) -> Self {
        let oidc = OidcVerifier::new(config.oidc.clone(), http);
        Self { config, oidc }
    }

    pub async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        match self.config.mode {
            AuthMode::Hs256 => {
                let claims =
                    hs256::verify_token(&self.config.hs256_secret, &self.config.hs256_issuer, token)?;
                let scopes = hs256::extract_scopes(&claims);
                let tenant_id = claims
                    .get("tenant")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("default")
                    .to_string();
                Ok(AuthContext {
                    claims,
                    scopes,
                    tenant_id,
                })
            }
            AuthMode::Oidc => {
                let claims = self.oidc.verify(token).await?;
                let client_id = if self.config.oidc.client_id.is_empty() {
                    None
                } else {
                    Some(self.config.oidc.client_id.as_str())
                };
                let scopes = oidc::extract_scopes_keycloak(&claims, client_id);
                let tenant_id = oidc::extract_tenant_from_groups(&claims)
                    .unwrap_or_else(|| "default".to_string());
                Ok(AuthContext {
                    claims,
                    scopes,
                    tenant_id,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256_authenticator() -> Authenticator {
        Authenticator::new(
            AuthConfig {
                mode: AuthMode::Hs256,
                hs256_secret: "dev-secret".to_string(),
                hs256_issuer: "credo".to_string(),
                oidc: OidcConfig::default(),
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn hs256_context_carries_scopes_and_tenant() {
        let auth = hs256_authenticator();
        let token = hs256::issue_token(
            "dev-secret",
            "credo",
            "admin",
            &["agents:create".to_string(), "credentials:issue".to_string()],
            "acme",
            3600,
        )
        .unwrap();

        let ctx = auth.verify(&token).await.unwrap();
        assert_eq!(ctx.tenant_id, "acme");
        assert!(ctx.require_scopes(&["agents:create"]).is_ok());
        assert!(matches!(
            ctx.require_scopes(&["tenant:admin"]),
            Err(AuthError::ScopeInsufficient { .. })
        ));
    }

    #[tokio::test]
    async fn missing_tenant_claim_defaults() {
        let auth = hs256_authenticator();
        let token = hs256::issue_token("dev-secret", "credo", "admin", &[], "", 3600).unwrap();
        let ctx = auth.verify(&token).await.unwrap();
        assert_eq!(ctx.tenant_id, "default");
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let auth = hs256_authenticator();
        assert!(auth.verify("not-a-jwt").await.is_err());
    }
}
