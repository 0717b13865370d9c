use thiserror::Error;

/// Errors produced by the core credential engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Status list is full")]
    StatusListFull,

    #[error("KMS error: {0}")]
    Kms(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
