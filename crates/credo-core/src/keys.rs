//! Ed25519 key material.
//!
//! Keys are generated with ed25519-dalek, exported publicly as OKP JWKs and
//! privately as PKCS#8 v1 DER (the form jsonwebtoken's EdDSA signer
//! consumes). Private DER never leaves this process unsealed; the KMS seals
//! it before it reaches storage.

use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const KEY_ALG: &str = "Ed25519";

/// Public half of an agent key, in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
}

/// Freshly generated keypair, private half still unsealed.
pub struct GeneratedKey {
    /// PKCS#8 v1 DER encoding of the private key.
    pub private_pkcs8_der: Vec<u8>,
    pub public_jwk: PublicJwk,
}

/// Generate a new Ed25519 keypair.
pub fn generate_ed25519() -> GeneratedKey {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let signing = SigningKey::from_bytes(&seed);
    let verifying: VerifyingKey = signing.verifying_key();

    GeneratedKey {
        private_pkcs8_der: pkcs8_from_seed(&seed),
        public_jwk: PublicJwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: crate::codec::b64url(verifying.as_bytes()),
        },
    }
}

/// Extract the raw 32-byte public key from a JWK. Only `OKP`/`Ed25519` is
/// accepted.
pub fn public_key_from_jwk(jwk: &PublicJwk) -> CoreResult<[u8; 32]> {
    if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
        return Err(CoreError::Validation("Unsupported JWK".to_string()));
    }
    let raw = crate::codec::b64url_decode(&jwk.x)?;
    raw.as_slice()
        .try_into()
        .map_err(|_| CoreError::Validation("Invalid JWK: x is not 32 bytes".to_string()))
}

/// A verification key for jsonwebtoken, built from a JWK.
pub fn decoding_key_from_jwk(jwk: &PublicJwk) -> CoreResult<DecodingKey> {
    let raw = public_key_from_jwk(jwk)?;
    Ok(DecodingKey::from_ed_der(&raw))
}

/// Everything a signer needs: the `kid` that goes into the JWT header and
/// the jsonwebtoken encoding key.
pub struct SigningMaterial {
    pub kid: String,
    key: EncodingKey,
}

impl SigningMaterial {
    pub fn from_pkcs8_der(kid: impl Into<String>, pkcs8_der: &[u8]) -> Self {
        Self {
            kid: kid.into(),
            key: EncodingKey::from_ed_der(pkcs8_der),
        }
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.key
    }
}

// jsonwebtoken expects PKCS8 DER for Ed25519 private keys. PKCS8 v1 wraps
// the 32-byte seed as:
//   SEQUENCE {
//     INTEGER 0 (version)
//     SEQUENCE { OID 1.3.101.112 } (Ed25519)
//     OCTET STRING { OCTET STRING { <32 seed bytes> } }
//   }
fn pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    const PREFIX: &[u8] = &[
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER 0 (version)
        0x30, 0x05, // SEQUENCE, 5 bytes
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the seed)
    ];
    let mut der = Vec::with_capacity(48);
    der.extend_from_slice(PREFIX);
    der.extend_from_slice(seed);
    der
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_jwk_is_okp_ed25519() {
        let key = generate_ed25519();
        assert_eq!(key.public_jwk.kty, "OKP");
        assert_eq!(key.public_jwk.crv, "Ed25519");
        assert_eq!(public_key_from_jwk(&key.public_jwk).unwrap().len(), 32);
        assert_eq!(key.private_pkcs8_der.len(), 48);
    }

    #[test]
    fn rsa_style_jwk_rejected() {
        let jwk = PublicJwk {
            kty: "RSA".to_string(),
            crv: "Ed25519".to_string(),
            x: "AA".to_string(),
        };
        assert!(public_key_from_jwk(&jwk).is_err());
    }

    #[test]
    fn wrong_curve_rejected() {
        let jwk = PublicJwk {
            kty: "OKP".to_string(),
            crv: "X25519".to_string(),
            x: "AA".to_string(),
        };
        assert!(public_key_from_jwk(&jwk).is_err());
    }

    #[test]
    fn truncated_x_rejected() {
        let jwk = PublicJwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: crate::codec::b64url(&[0u8; 16]),
        };
        assert!(public_key_from_jwk(&jwk).is_err());
    }

    #[test]
    fn sign_verify_through_jsonwebtoken() {
        use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
        use serde::{Deserialize, Serialize};

        #[derive(Serialize, Deserialize)]
        struct Claims {
            iss: String,
            exp: i64,
        }

        let key = generate_ed25519();
        let material = SigningMaterial::from_pkcs8_der("did:web:test#key-1", &key.private_pkcs8_der);

        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &Claims {
                iss: "did:web:test".to_string(),
                exp: chrono::Utc::now().timestamp() + 600,
            },
            material.encoding_key(),
        )
        .unwrap();

        let decoding = decoding_key_from_jwk(&key.public_jwk).unwrap();
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.required_spec_claims.clear();
        let decoded = decode::<Claims>(&token, &decoding, &validation).unwrap();
        assert_eq!(decoded.claims.iss, "did:web:test");
    }
}
