//! Token claims and the claims builder.
//!
//! The builder is pure: it turns a [`TokenRequest`] and an instant into
//! [`TokenClaims`] without touching any collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

use crate::action::Action;
use crate::error::TokenError;
use crate::principal::Principal;
use crate::validity::parse_validity;
use crate::TokenResult;

/// Free-form parameters carried by a token.
pub type TokenParams = Map<String, Value>;

/// Signed payload of an account action token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Principal id.
    pub id: u64,

    /// Principal username at issuance.
    pub username: String,

    /// Principal email at issuance.
    pub email: String,

    /// The single action this token authorizes.
    pub action: Action,

    /// Data the verifying side needs to complete the action.
    #[serde(default)]
    pub params: TokenParams,

    /// Whether verification should also log the principal in.
    #[serde(default)]
    pub login: bool,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp, exclusive).
    pub exp: i64,

    /// Unique token id.
    pub jti: String,
}

impl TokenClaims {
    /// Returns the principal snapshot the token was issued for.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.email.clone())
    }

    /// Returns the length of the validity window.
    #[must_use]
    pub fn validity(&self) -> Duration {
        Duration::seconds(self.exp - self.iat)
    }

    /// Returns `true` if `now` falls inside `[iat, exp)`.
    #[must_use]
    pub fn is_within_window(&self, now: OffsetDateTime) -> bool {
        let now = now.unix_timestamp();
        now >= self.iat && now < self.exp
    }
}

/// Everything needed to issue one token.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    principal: Principal,
    action: Action,
    params: TokenParams,
    login: bool,
    validity: Option<String>,
}

impl TokenRequest {
    /// Creates a request with no params, `login = false` and the default validity.
    #[must_use]
    pub fn new(principal: Principal, action: Action) -> Self {
        Self {
            principal,
            action,
            params: TokenParams::new(),
            login: false,
            validity: None,
        }
    }

    /// Creates a request from an action's wire name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` if the name is not part of the enumeration.
    pub fn named(principal: Principal, action: &str) -> TokenResult<Self> {
        Ok(Self::new(principal, action.parse()?))
    }

    /// Replaces the params.
    #[must_use]
    pub fn params(mut self, params: TokenParams) -> Self {
        self.params = params;
        self
    }

    /// Adds a single param.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the login flag.
    #[must_use]
    pub fn login(mut self, login: bool) -> Self {
        self.login = login;
        self
    }

    /// Sets the validity expression (e.g. `"+1 week"`).
    #[must_use]
    pub fn validity(mut self, expression: impl Into<String>) -> Self {
        self.validity = Some(expression.into());
        self
    }

    /// Returns the principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }
}

/// Assembles claims from token requests.
#[derive(Debug, Clone)]
pub struct ClaimsBuilder {
    issuer: String,
    default_validity: Duration,
}

impl ClaimsBuilder {
    /// Creates a builder stamping `issuer` and falling back to `default_validity`.
    #[must_use]
    pub fn new(issuer: impl Into<String>, default_validity: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            default_validity,
        }
    }

    /// Builds the claims for `request`, valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrincipal` if the principal has no id or no usable
    /// email, and `InvalidDuration` if the validity expression is rejected.
    pub fn build(&self, request: &TokenRequest, now: OffsetDateTime) -> TokenResult<TokenClaims> {
        let principal = &request.principal;
        let id = principal
            .id()
            .ok_or_else(|| TokenError::invalid_principal("principal has no identifier"))?;
        let email = principal.email().trim();
        if email.is_empty() || !email.contains('@') {
            return Err(TokenError::invalid_principal(
                "principal has no usable email address",
            ));
        }

        let validity = match &request.validity {
            Some(expression) => parse_validity(expression)?,
            None => self.default_validity,
        };

        // `exp` must stay a representable instant for the consumed-token ledger.
        let expires_at = now
            .checked_add(validity)
            .ok_or_else(|| TokenError::invalid_duration(format!("{validity}")))?;
        let iat = now.unix_timestamp();
        let exp = expires_at.unix_timestamp();

        Ok(TokenClaims {
            iss: self.issuer.clone(),
            id,
            username: principal.username().to_string(),
            email: email.to_string(),
            action: request.action,
            params: request.params.clone(),
            login: request.login,
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        })
    }
}
