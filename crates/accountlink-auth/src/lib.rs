//! # accountlink-auth
//!
//! Stateless, signed, time-limited tokens for account actions.
//!
//! A token authorizes exactly one [`Action`] for one [`Principal`] inside a
//! validity window. Nothing is stored at issuance; verification needs only
//! the shared secret and a clock. Single-use enforcement is opt-in through a
//! [`ConsumedTokenLedger`].
//!
//! ## Modules
//!
//! - [`action`] - Action enumeration and UI descriptors
//! - [`clock`] - Injectable time source
//! - [`config`] - Token configuration and service construction
//! - [`error`] - Error taxonomy
//! - [`principal`] - Principal snapshot
//! - [`storage`] - Principal lookup and consumed token ledger traits
//! - [`token`] - Claims, codec, issuance, verification
//! - [`validity`] - Validity expression parsing

pub mod action;
pub mod clock;
pub mod config;
pub mod error;
pub mod principal;
pub mod storage;
pub mod token;
pub mod validity;

pub use action::{Action, ActionDescriptor, ActionDispatcher};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, TokenConfig};
pub use error::{ErrorCategory, TokenError};
pub use principal::Principal;
pub use storage::{ConsumedTokenLedger, MemoryTokenLedger, PrincipalStore};
pub use token::{
    ClaimsBuilder, HmacAlgorithm, IssuedTokenBundle, IssuerConfig, JwtCodec, TokenClaims,
    TokenCodec, TokenIssuer, TokenParams, TokenRequest, TokenVerifier, ensure_self_service,
};
pub use validity::parse_validity;

/// Type alias for token results.
pub type TokenResult<T> = Result<T, TokenError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use accountlink_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::TokenResult;
    pub use crate::action::{Action, ActionDescriptor, ActionDispatcher};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::TokenConfig;
    pub use crate::error::{ErrorCategory, TokenError};
    pub use crate::principal::Principal;
    pub use crate::storage::{ConsumedTokenLedger, PrincipalStore};
    pub use crate::token::{
        IssuedTokenBundle, TokenClaims, TokenIssuer, TokenParams, TokenRequest, TokenVerifier,
    };
}
