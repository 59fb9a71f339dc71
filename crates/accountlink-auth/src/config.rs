//! Token configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [tokens]
//! issuer = "https://accounts.example.com"
//! secret = "change-me-to-a-long-random-string-of-32-bytes"
//! algorithm = "HS256"
//! default_validity = "+1 day"
//! recovery_validity = "+1 week"
//! single_use = true
//! ```

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::storage::ConsumedTokenLedger;
use crate::token::codec::{HmacAlgorithm, JwtCodec, MIN_SECRET_LEN, TokenCodec};
use crate::token::issuance::{IssuerConfig, TokenIssuer};
use crate::token::verification::TokenVerifier;
use crate::validity::{DEFAULT_VALIDITY, RECOVERY_VALIDITY, parse_validity};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Token signing and validity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Issuer claim written into and required on every token.
    pub issuer: String,

    /// Shared HMAC secret. Must be at least 32 bytes.
    pub secret: String,

    /// HMAC algorithm: HS256, HS384 or HS512.
    pub algorithm: String,

    /// Validity of tokens that do not name their own.
    pub default_validity: String,

    /// Validity of account recovery tokens.
    pub recovery_validity: String,

    /// Refuse a token once it has completed its action.
    pub single_use: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "accountlink".to_string(),
            secret: String::new(),
            algorithm: "HS256".to_string(),
            default_validity: DEFAULT_VALIDITY.to_string(),
            recovery_validity: RECOVERY_VALIDITY.to_string(),
            single_use: true,
        }
    }
}

impl TokenConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the secret is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - The secret is shorter than 32 bytes
    /// - The algorithm is not supported
    /// - Either validity expression does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if self.secret.is_empty() {
            return Err(ConfigError::Missing("tokens.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        self.hmac_algorithm()?;

        for (name, expression) in [
            ("default_validity", &self.default_validity),
            ("recovery_validity", &self.recovery_validity),
        ] {
            parse_validity(expression).map_err(|_| {
                ConfigError::InvalidValue(format!("Invalid {name}: '{expression}'"))
            })?;
        }

        Ok(())
    }

    /// Parses the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for anything but HS256, HS384 or HS512.
    pub fn hmac_algorithm(&self) -> Result<HmacAlgorithm, ConfigError> {
        HmacAlgorithm::from_str(&self.algorithm).map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid signing algorithm: '{}'. Must be HS256, HS384, or HS512",
                self.algorithm
            ))
        })
    }

    /// Builds the JWT codec described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration does not validate.
    pub fn build_codec(&self) -> Result<Arc<dyn TokenCodec>, ConfigError> {
        self.validate()?;
        let codec = JwtCodec::new(self.hmac_algorithm()?, self.secret.as_bytes(), &self.issuer)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(Arc::new(codec))
    }

    /// Builds an issuer that shares `codec` and `clock`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `default_validity` does not parse.
    pub fn build_issuer(
        &self,
        codec: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
    ) -> Result<TokenIssuer, ConfigError> {
        let default_validity = parse_validity(&self.default_validity).map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid default_validity: '{}'",
                self.default_validity
            ))
        })?;
        let config = IssuerConfig::new(&self.issuer)
            .with_default_validity(default_validity)
            .with_recovery_validity(&self.recovery_validity);
        Ok(TokenIssuer::new(codec, clock, config))
    }

    /// Builds a verifier. The ledger is attached only when `single_use` is set.
    #[must_use]
    pub fn build_verifier(
        &self,
        codec: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn ConsumedTokenLedger>,
    ) -> TokenVerifier {
        let verifier = TokenVerifier::new(codec, clock);
        if self.single_use {
            verifier.with_ledger(ledger)
        } else {
            verifier
        }
    }
}
