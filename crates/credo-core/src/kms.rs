//! Sealed storage for private key material.
//!
//! The store only ever sees sealed ciphertext; unsealing happens in memory
//! at signing time. The default implementation is AES-256-GCM with a key
//! derived from the service secret. Swapping in an external KMS means
//! implementing [`Kms`] on something else.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::codec::{b64url, b64url_decode};
use crate::error::{CoreError, CoreResult};

const NONCE_LEN: usize = 12;

pub trait Kms: Send + Sync {
    /// Seal plaintext into an opaque portable string.
    fn seal(&self, plaintext: &[u8]) -> CoreResult<String>;

    /// Inverse of [`Kms::seal`].
    fn unseal(&self, sealed: &str) -> CoreResult<Vec<u8>>;
}

/// AES-256-GCM envelope sealing keyed by SHA-256 of the service secret.
/// Sealed form: base64url(nonce || ciphertext).
pub struct EnvelopeKms {
    key: [u8; 32],
}

impl EnvelopeKms {
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        Self { key: digest.into() }
    }
}

impl Kms for EnvelopeKms {
    fn seal(&self, plaintext: &[u8]) -> CoreResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::Kms(format!("bad key length: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CoreError::Kms(format!("seal failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(b64url(&out))
    }

    fn unseal(&self, sealed: &str) -> CoreResult<Vec<u8>> {
        let raw = b64url_decode(sealed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CoreError::Kms("sealed blob too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::Kms(format!("bad key length: {}", e)))?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CoreError::Kms("unseal failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal_roundtrip() {
        let kms = EnvelopeKms::from_secret("test-secret");
        let sealed = kms.seal(b"private key bytes").unwrap();
        assert_ne!(sealed.as_bytes(), b"private key bytes");
        assert_eq!(kms.unseal(&sealed).unwrap(), b"private key bytes");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let kms = EnvelopeKms::from_secret("test-secret");
        let a = kms.seal(b"same input").unwrap();
        let b = kms.seal(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unseal_with_wrong_secret_fails() {
        let sealed = EnvelopeKms::from_secret("one").seal(b"data").unwrap();
        assert!(EnvelopeKms::from_secret("two").unseal(&sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let kms = EnvelopeKms::from_secret("test-secret");
        let sealed = kms.seal(b"data").unwrap();
        let mut raw = b64url_decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(kms.unseal(&b64url(&raw)).is_err());
    }
}
