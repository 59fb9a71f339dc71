//! Token verification service.
//!
//! Verification runs in a fixed order and stops at the first failure:
//!
//! 1. decode the token and check its signature (`Malformed`)
//! 2. check the validity window against the clock (`NotYetValid`, `Expired`)
//! 3. compare the action when the caller names one (`ActionMismatch`)
//!
//! [`TokenVerifier::verify`] never touches storage. [`TokenVerifier::consume`]
//! additionally records the token id in a [`ConsumedTokenLedger`] so that a
//! token can only complete its action once.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::TokenResult;
use crate::action::Action;
use crate::clock::Clock;
use crate::error::TokenError;
use crate::storage::ConsumedTokenLedger;
use crate::token::claims::TokenClaims;
use crate::token::codec::TokenCodec;

/// Verifies account action tokens.
pub struct TokenVerifier {
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    ledger: Option<Arc<dyn ConsumedTokenLedger>>,
}

impl TokenVerifier {
    /// Creates a stateless verifier.
    #[must_use]
    pub fn new(codec: Arc<dyn TokenCodec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec,
            clock,
            ledger: None,
        }
    }

    /// Enables single-use enforcement in [`consume`](Self::consume).
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn ConsumedTokenLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Returns `true` if consumed tokens are tracked.
    #[must_use]
    pub fn is_single_use(&self) -> bool {
        self.ledger.is_some()
    }

    /// Verifies `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `NotYetValid`, `Expired` or `ActionMismatch`.
    pub fn verify(&self, token: &str, expected: Option<Action>) -> TokenResult<TokenClaims> {
        self.verify_at(token, expected, self.clock.now())
    }

    /// Verifies `token` as of `now`.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify).
    pub fn verify_at(
        &self,
        token: &str,
        expected: Option<Action>,
        now: OffsetDateTime,
    ) -> TokenResult<TokenClaims> {
        let claims = self.codec.decode(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Rejected undecodable account token");
        })?;

        let now_ts = now.unix_timestamp();
        if now_ts < claims.iat {
            tracing::debug!(jti = %claims.jti, iat = claims.iat, "Account token not yet valid");
            return Err(TokenError::NotYetValid);
        }
        if now_ts >= claims.exp {
            tracing::debug!(jti = %claims.jti, exp = claims.exp, "Account token expired");
            return Err(TokenError::Expired);
        }

        if let Some(expected) = expected
            && expected != claims.action
        {
            tracing::debug!(
                jti = %claims.jti,
                expected = %expected,
                actual = %claims.action,
                "Account token action mismatch"
            );
            return Err(TokenError::action_mismatch(
                expected.as_str(),
                claims.action.as_str(),
            ));
        }

        Ok(claims)
    }

    /// Verifies `token` and, when a ledger is attached, refuses it once it
    /// was consumed. Nothing is recorded.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify), plus `AlreadyConsumed` and `Storage`.
    pub async fn verify_unspent(
        &self,
        token: &str,
        expected: Option<Action>,
    ) -> TokenResult<TokenClaims> {
        let claims = self.verify(token, expected)?;
        if let Some(ledger) = &self.ledger
            && ledger.is_consumed(&claims.jti).await?
        {
            return Err(TokenError::AlreadyConsumed);
        }
        Ok(claims)
    }

    /// Verifies `token` and marks it consumed.
    ///
    /// Without a ledger this is the same as [`verify`](Self::verify).
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify), plus `AlreadyConsumed` when the token
    /// was used before and `Storage` if the ledger fails.
    pub async fn consume(&self, token: &str, expected: Option<Action>) -> TokenResult<TokenClaims> {
        let claims = self.verify(token, expected)?;

        let Some(ledger) = &self.ledger else {
            return Ok(claims);
        };

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|e| TokenError::malformed(format!("invalid exp: {e}")))?;
        if !ledger.mark_consumed(&claims.jti, expires_at).await? {
            tracing::warn!(
                jti = %claims.jti,
                principal_id = claims.id,
                action = %claims.action,
                "Replayed account token refused"
            );
            return Err(TokenError::AlreadyConsumed);
        }

        tracing::info!(
            jti = %claims.jti,
            principal_id = claims.id,
            action = %claims.action,
            "Account token consumed"
        );
        Ok(claims)
    }
}
