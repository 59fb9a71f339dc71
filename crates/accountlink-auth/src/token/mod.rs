//! Token construction, encoding, issuance and verification.
//!
//! - [`claims`] - claims and the builder that fills them in
//! - [`codec`] - signed JWT encoding
//! - [`issuance`] - single and compound token issuance
//! - [`verification`] - window and action checks, single-use consumption

pub mod claims;
pub mod codec;
pub mod issuance;
pub mod verification;

pub use claims::{ClaimsBuilder, TokenClaims, TokenParams, TokenRequest};
pub use codec::{HmacAlgorithm, JwtCodec, MIN_SECRET_LEN, TokenCodec, generate_secret};
pub use issuance::{IssuedTokenBundle, IssuerConfig, TokenIssuer, ensure_self_service};
pub use verification::TokenVerifier;
