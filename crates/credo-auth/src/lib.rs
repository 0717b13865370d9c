//! Bearer-token verification for the credo API.
//!
//! Two modes: internal HS256 tokens minted by this service, or external
//! RS256 tokens verified against an OIDC provider's JWKS. Neither mode is
//! ever accepted on VC verification paths; those are EdDSA only.

mod context;
mod error;
pub mod hs256;
pub mod oidc;

pub use context::{AuthConfig, AuthContext, AuthMode, Authenticator};
pub use error::AuthError;
pub use oidc::OidcConfig;
