//! Account token error types.
//!
//! Issuance and verification share one error enum so that callers can pick
//! user-facing messaging from a single [`TokenError::code`].

use std::fmt;

/// Errors that can occur while issuing or verifying account action tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The principal is missing its identity or a usable email address.
    #[error("Invalid principal: {message}")]
    InvalidPrincipal {
        /// Description of why the principal is invalid.
        message: String,
    },

    /// The validity expression could not be parsed or is not positive.
    #[error("Invalid duration: '{expression}'")]
    InvalidDuration {
        /// The rejected expression.
        expression: String,
    },

    /// The action name is not part of the action enumeration.
    #[error("Unknown action: '{action}'")]
    UnknownAction {
        /// The rejected action name.
        action: String,
    },

    /// The token codec failed to encode the claims.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The token is malformed or its signature does not verify.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of the decoding error.
        message: String,
    },

    /// The token's validity window has not started yet.
    #[error("Token not yet valid")]
    NotYetValid,

    /// The token's validity window has ended.
    #[error("Token expired")]
    Expired,

    /// The token authorizes a different action than the one requested.
    #[error("Action mismatch: expected '{expected}', token carries '{actual}'")]
    ActionMismatch {
        /// The action the caller asked for.
        expected: String,
        /// The action found in the token.
        actual: String,
    },

    /// The token has already been used to perform its action.
    #[error("Token already consumed")]
    AlreadyConsumed,

    /// The acting principal is not allowed to act on the target principal.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// An error occurred in a storage collaborator.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The token configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `InvalidPrincipal` error.
    #[must_use]
    pub fn invalid_principal(message: impl Into<String>) -> Self {
        Self::InvalidPrincipal {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidDuration` error.
    #[must_use]
    pub fn invalid_duration(expression: impl Into<String>) -> Self {
        Self::InvalidDuration {
            expression: expression.into(),
        }
    }

    /// Creates a new `UnknownAction` error.
    #[must_use]
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `ActionMismatch` error.
    #[must_use]
    pub fn action_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ActionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error was raised while issuing a token.
    #[must_use]
    pub fn is_issuance_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrincipal { .. }
                | Self::InvalidDuration { .. }
                | Self::UnknownAction { .. }
                | Self::Encoding { .. }
        )
    }

    /// Returns `true` if the error is a rejection of a presented token.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. }
                | Self::NotYetValid
                | Self::Expired
                | Self::ActionMismatch { .. }
                | Self::AlreadyConsumed
        )
    }

    /// Returns `true` if this is a server-side failure rather than a caller error.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Encoding { .. } | Self::Storage { .. } | Self::Configuration { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPrincipal { .. }
            | Self::InvalidDuration { .. }
            | Self::UnknownAction { .. } => ErrorCategory::Validation,
            Self::Encoding { .. } => ErrorCategory::Internal,
            Self::Malformed { .. }
            | Self::NotYetValid
            | Self::Expired
            | Self::ActionMismatch { .. }
            | Self::AlreadyConsumed => ErrorCategory::Token,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPrincipal { .. } => "invalid_principal",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::UnknownAction { .. } => "unknown_action",
            Self::Encoding { .. } => "encoding_error",
            Self::Malformed { .. } => "malformed",
            Self::NotYetValid => "not_yet_valid",
            Self::Expired => "expired",
            Self::ActionMismatch { .. } => "action_mismatch",
            Self::AlreadyConsumed => "already_consumed",
            Self::Forbidden { .. } => "forbidden",
            Self::Storage { .. } => "storage_error",
            Self::Configuration { .. } => "configuration_error",
        }
    }
}

/// Categories of token errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input to issuance.
    Validation,
    /// Presented token rejected.
    Token,
    /// Acting principal not allowed.
    Authorization,
    /// Storage collaborator failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Token => write!(f, "token"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
