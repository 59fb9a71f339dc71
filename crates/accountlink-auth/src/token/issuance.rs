//! Token issuance service.
//!
//! Orchestrates the claims builder and the codec. Delivery of the token and
//! the acknowledgment shown to the user are left to the caller; every method
//! here returns tokens that are fully formed and ready to embed.
//!
//! # Usage
//!
//! ```ignore
//! use accountlink_auth::token::{TokenIssuer, TokenRequest};
//!
//! let issuer = TokenIssuer::new(codec, clock, config);
//! let token = issuer.issue(&TokenRequest::new(principal, Action::PasswordReset))?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use time::Duration;

use crate::TokenResult;
use crate::action::{Action, ActionDispatcher};
use crate::clock::Clock;
use crate::error::TokenError;
use crate::principal::Principal;
use crate::token::claims::{ClaimsBuilder, TokenParams, TokenRequest};
use crate::token::codec::TokenCodec;
use crate::validity::RECOVERY_VALIDITY;

/// Result of an issuance call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedTokenBundle {
    /// Action of the primary token.
    pub action: Action,

    /// The primary token.
    pub primary: String,

    /// Longer-lived `account_recovery` token bound to the pre-change snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,

    /// `password_reset` token offered alongside a self-service token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<String>,
}

/// Validity windows used by the issuer.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Issuer claim value.
    pub issuer: String,
    /// Validity of primary tokens when the request does not name one.
    pub default_validity: Duration,
    /// Validity expression applied to recovery tokens.
    pub recovery_validity: String,
}

impl IssuerConfig {
    /// Creates a configuration with the default windows (one day, one week).
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            default_validity: Duration::days(1),
            recovery_validity: RECOVERY_VALIDITY.to_string(),
        }
    }

    /// Sets the default validity of primary tokens.
    #[must_use]
    pub fn with_default_validity(mut self, validity: Duration) -> Self {
        self.default_validity = validity;
        self
    }

    /// Sets the validity expression of recovery tokens.
    #[must_use]
    pub fn with_recovery_validity(mut self, expression: impl Into<String>) -> Self {
        self.recovery_validity = expression.into();
        self
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self::new("accountlink")
    }
}

/// Issues account action tokens.
pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    builder: ClaimsBuilder,
    dispatcher: ActionDispatcher,
    recovery_validity: String,
}

impl TokenIssuer {
    /// Creates a new issuer.
    #[must_use]
    pub fn new(codec: Arc<dyn TokenCodec>, clock: Arc<dyn Clock>, config: IssuerConfig) -> Self {
        Self {
            codec,
            clock,
            builder: ClaimsBuilder::new(config.issuer, config.default_validity),
            dispatcher: ActionDispatcher::new(),
            recovery_validity: config.recovery_validity,
        }
    }

    /// Returns the action dispatcher used to pick login flags.
    #[must_use]
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Issues a single token.
    ///
    /// # Errors
    ///
    /// Propagates `InvalidPrincipal` and `InvalidDuration` from the claims
    /// builder and `Encoding` from the codec.
    pub fn issue(&self, request: &TokenRequest) -> TokenResult<String> {
        let claims = self.builder.build(request, self.clock.now())?;
        let token = self.codec.encode(&claims)?;

        tracing::info!(
            principal_id = claims.id,
            action = %claims.action,
            login = claims.login,
            jti = %claims.jti,
            expires_at = claims.exp,
            "Account token issued"
        );

        Ok(token)
    }

    /// Issues a self-service token together with a password reset token.
    ///
    /// The reset token lets the principal take over their account if they
    /// did not request the action themselves.
    ///
    /// # Errors
    ///
    /// Same as [`issue`](Self::issue).
    pub fn issue_with_reset(
        &self,
        principal: &Principal,
        action: Action,
        params: TokenParams,
    ) -> TokenResult<IssuedTokenBundle> {
        let primary = self.issue(
            &TokenRequest::new(principal.clone(), action)
                .params(params)
                .login(self.dispatcher.implies_login(action)),
        )?;
        let reset = self.issue(
            &TokenRequest::new(principal.clone(), Action::PasswordReset).login(true),
        )?;

        Ok(IssuedTokenBundle {
            action,
            primary,
            recovery: None,
            reset: Some(reset),
        })
    }

    /// Compound issuance for an identity change.
    ///
    /// `previous` is the snapshot taken before the change and `current` the
    /// one after it. The primary `user_login` token goes to the new state
    /// with the default validity; the `account_recovery` token is bound to the
    /// previous snapshot, logs in on use, and lives for the recovery window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrincipal` if the snapshots belong to different
    /// principals, otherwise the same errors as [`issue`](Self::issue).
    pub fn issue_identity_change(
        &self,
        previous: &Principal,
        current: &Principal,
        params: TokenParams,
    ) -> TokenResult<IssuedTokenBundle> {
        if !previous.same_identity(current) {
            return Err(TokenError::invalid_principal(
                "identity change snapshots belong to different principals",
            ));
        }

        let primary = self.issue(
            &TokenRequest::new(current.clone(), Action::UserLogin)
                .params(params.clone())
                .login(self.dispatcher.implies_login(Action::UserLogin)),
        )?;
        let recovery = self.issue(
            &TokenRequest::new(previous.clone(), Action::AccountRecovery)
                .params(params)
                .login(true)
                .validity(self.recovery_validity.clone()),
        )?;

        Ok(IssuedTokenBundle {
            action: Action::UserLogin,
            primary,
            recovery: Some(recovery),
            reset: None,
        })
    }
}

/// Rejects self-service issuance on behalf of another principal.
///
/// # Errors
///
/// Returns `Forbidden` unless `acting` and `target` are the same persisted user.
pub fn ensure_self_service(acting: &Principal, target: &Principal) -> TokenResult<()> {
    if acting.same_identity(target) {
        Ok(())
    } else {
        tracing::warn!(
            acting_id = ?acting.id(),
            target_id = ?target.id(),
            "Refused token issuance for another principal"
        );
        Err(TokenError::forbidden(
            "you are not allowed to perform this action",
        ))
    }
}
