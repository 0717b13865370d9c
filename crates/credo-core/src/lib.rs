//! Core credential engine for the credo authority.
//!
//! Everything in this crate is persistence-free: key material, `did:web`
//! documents, VC-JWT issuance and verification, and the bitstring status
//! list envelope. Callers provide the two capabilities that touch the
//! outside world, a [`DidResolver`] and a [`StatusChecker`].

pub mod bitstring;
pub mod canonical;
pub mod codec;
pub mod did;
pub mod error;
pub mod keys;
pub mod kms;
pub mod status;
pub mod vc;

pub use bitstring::Bitstring;
pub use did::{build_did_document, DidDocument, DocumentKey, VerificationMethod};
pub use error::CoreError;
pub use keys::{GeneratedKey, PublicJwk, SigningMaterial};
pub use kms::{EnvelopeKms, Kms};
pub use vc::{CredentialStatus, DidResolver, IssuedVc, StatusChecker, VerifiedVc};
