//! Token codec.
//!
//! Account tokens are compact JWS strings signed with an HMAC over the full
//! claim set. The codec checks the signature, the algorithm and the issuer;
//! the validity window is checked by the verifier against its own clock.
//!
//! ## Example
//!
//! ```ignore
//! use accountlink_auth::token::codec::{JwtCodec, HmacAlgorithm, TokenCodec};
//!
//! let codec = JwtCodec::new(HmacAlgorithm::HS256, secret.as_bytes(), "https://accounts.example.com")?;
//! let token = codec.encode(&claims)?;
//! let decoded = codec.decode(&token)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::TokenResult;
use crate::error::TokenError;
use crate::token::claims::TokenClaims;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Signs claims into opaque strings and turns them back into claims.
pub trait TokenCodec: Send + Sync {
    /// Encodes and signs claims.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if the claims cannot be serialized or signed.
    fn encode(&self, claims: &TokenClaims) -> TokenResult<String>;

    /// Verifies the signature of a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the token cannot be parsed, is signed with an
    /// unexpected algorithm or key, or names another issuer.
    fn decode(&self, token: &str) -> TokenResult<TokenClaims>;
}

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl HmacAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HmacAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(TokenError::configuration(format!(
                "Invalid signing algorithm: '{other}'. Must be HS256, HS384, or HS512"
            ))),
        }
    }
}

/// Generates a random signing secret, base64url encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 48];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// HMAC-signed JWT codec.
///
/// This codec is thread-safe (`Send + Sync`) and can be shared across
/// request handlers.
pub struct JwtCodec {
    algorithm: HmacAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtCodec {
    /// Creates a codec signing with `secret` and stamping `issuer`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(
        algorithm: HmacAlgorithm,
        secret: &[u8],
        issuer: impl Into<String>,
    ) -> TokenResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::configuration(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        })
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }

    /// Returns the issuer tokens are stamped with.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        // The verifier owns the validity window.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["iss".to_string()]);
        validation
    }
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenCodec for JwtCodec {
    fn encode(&self, claims: &TokenClaims) -> TokenResult<String> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());
        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::encoding(e.to_string()))
    }

    fn decode(&self, token: &str) -> TokenResult<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| TokenError::malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::principal::Principal;
    use crate::token::claims::{ClaimsBuilder, TokenRequest};
    use time::{Duration, OffsetDateTime};

    const ISSUER: &str = "https://accounts.example.com";

    fn codec() -> JwtCodec {
        JwtCodec::new(HmacAlgorithm::HS256, generate_secret().as_bytes(), ISSUER).unwrap()
    }

    fn claims() -> TokenClaims {
        ClaimsBuilder::new(ISSUER, Duration::days(1))
            .build(
                &TokenRequest::new(Principal::new(42, "alice", "a@x.com"), Action::PasswordReset)
                    .param("field", "password"),
                OffsetDateTime::now_utc(),
            )
            .unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let codec = codec();
        let claims = claims();
        let token = codec.encode(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn test_all_algorithms() {
        for algorithm in [HmacAlgorithm::HS256, HmacAlgorithm::HS384, HmacAlgorithm::HS512] {
            let codec = JwtCodec::new(algorithm, generate_secret().as_bytes(), ISSUER).unwrap();
            let token = codec.encode(&claims()).unwrap();
            assert!(codec.decode(&token).is_ok(), "{algorithm}");
        }
    }

    #[test]
    fn test_expired_claims_still_decode() {
        let codec = codec();
        let mut claims = claims();
        claims.iat -= 10 * 86_400;
        claims.exp -= 10 * 86_400;
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap().exp, claims.exp);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = codec().encode(&claims()).unwrap();
        let err = codec().decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Malformed { .. }));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let secret = generate_secret();
        let ours = JwtCodec::new(HmacAlgorithm::HS256, secret.as_bytes(), ISSUER).unwrap();
        let theirs =
            JwtCodec::new(HmacAlgorithm::HS256, secret.as_bytes(), "https://elsewhere").unwrap();

        let mut claims = claims();
        claims.iss = "https://elsewhere".to_string();
        let token = theirs.encode(&claims).unwrap();
        assert!(matches!(
            ours.decode(&token).unwrap_err(),
            TokenError::Malformed { .. }
        ));
    }

    #[test]
    fn test_algorithm_downgrade_rejected() {
        let secret = generate_secret();
        let hs512 = JwtCodec::new(HmacAlgorithm::HS512, secret.as_bytes(), ISSUER).unwrap();
        let hs256 = JwtCodec::new(HmacAlgorithm::HS256, secret.as_bytes(), ISSUER).unwrap();
        let token = hs256.encode(&claims()).unwrap();
        assert!(hs512.decode(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = codec();
        for token in ["", "abc", "a.b.c", "not.a.jwt.at.all"] {
            assert!(matches!(
                codec.decode(token).unwrap_err(),
                TokenError::Malformed { .. }
            ));
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = JwtCodec::new(HmacAlgorithm::HS256, b"too-short", ISSUER).unwrap_err();
        assert!(matches!(err, TokenError::Configuration { .. }));
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("HS384".parse::<HmacAlgorithm>().unwrap(), HmacAlgorithm::HS384);
        assert!("RS256".parse::<HmacAlgorithm>().is_err());
        assert_eq!(HmacAlgorithm::HS512.to_string(), "HS512");
    }

    #[test]
    fn test_generated_secrets_are_long_and_distinct() {
        let a = generate_secret();
        let b = generate_secret();
        assert!(a.len() >= MIN_SECRET_LEN);
        assert_ne!(a, b);
    }
}
