//! Environment-driven configuration.

use credo_auth::{AuthConfig, AuthMode, OidcConfig};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub api_host: String,
    pub api_port: u16,

    /// Service secret; seeds the key-sealing KMS and should be overridden
    /// outside local development.
    pub secret_key: String,

    /// did:web domain, percent-encoded (`:` in ports becomes `%3A`).
    pub domain: String,
    pub scheme: String,

    pub auth_mode: String,
    pub auth_jwt_secret: String,
    pub auth_jwt_issuer: String,
    pub oidc_issuer: String,
    pub oidc_audience: String,
    pub oidc_jwks_url: String,
    pub oidc_jwks_json: String,
    pub oidc_client_id: String,

    pub dev_mode: bool,
    pub cors_enabled: bool,
    pub allowed_origins: Vec<String>,

    pub max_body_bytes: usize,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_minute: u32,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            database_path: env_or("DATABASE_PATH", "credo.db"),
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_parse("API_PORT", 8080),
            secret_key: env_or("CREDO_SECRET_KEY", "change-me"),
            domain: env_or("CREDO_DOMAIN", "localhost%3A8080"),
            scheme: env_or("CREDO_SCHEME", "http"),
            auth_mode: env_or("AUTH_MODE", "hs256"),
            auth_jwt_secret: env_or("AUTH_JWT_SECRET", "dev-secret-change"),
            auth_jwt_issuer: env_or("AUTH_JWT_ISSUER", "credo"),
            oidc_issuer: env_or("OIDC_ISSUER", ""),
            oidc_audience: env_or("OIDC_AUDIENCE", ""),
            oidc_jwks_url: env_or("OIDC_JWKS_URL", ""),
            oidc_jwks_json: env_or("OIDC_JWKS_JSON", ""),
            oidc_client_id: env_or("OIDC_CLIENT_ID", ""),
            dev_mode: env_bool("CREDO_DEV_MODE", false),
            cors_enabled: env_bool("CORS_ENABLED", true),
            allowed_origins: env_or(
                "ALLOWED_ORIGINS",
                "http://127.0.0.1:8080,http://localhost:8080",
            )
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1_000_000),
            rate_limit_enabled: env_bool("RATE_LIMIT_ENABLED", false),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", 120),
        }
    }

    /// The decoded host:port form of the did:web domain.
    pub fn domain_decoded(&self) -> String {
        credo_core::did::decode_domain(&self.domain)
    }

    pub fn auth_config(&self) -> AuthConfig {
        let mode = if self.auth_mode.eq_ignore_ascii_case("oidc") {
            AuthMode::Oidc
        } else {
            AuthMode::Hs256
        };
        AuthConfig {
            mode,
            hs256_secret: self.auth_jwt_secret.clone(),
            hs256_issuer: self.auth_jwt_issuer.clone(),
            oidc: OidcConfig {
                issuer: self.oidc_issuer.clone(),
                audience: self.oidc_audience.clone(),
                jwks_url: self.oidc_jwks_url.clone(),
                jwks_json: self.oidc_jwks_json.clone(),
                client_id: self.oidc_client_id.clone(),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
