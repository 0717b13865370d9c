use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    Missing,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Missing scopes: {}", missing.join(", "))]
    ScopeInsufficient { missing: Vec<String> },

    #[error("Auth configuration error: {0}")]
    Config(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::Invalid(err.to_string())
    }
}
