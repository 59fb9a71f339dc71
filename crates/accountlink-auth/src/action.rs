//! Account actions and their message metadata.
//!
//! Every token authorizes exactly one [`Action`]. The dispatcher maps an
//! action to its [`ActionDescriptor`], the static metadata used to word the
//! mail that delivers the token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Mail template used for generic action tokens.
pub const TOKEN_TEMPLATE: &str = "token";
/// Mail template used for the registration confirmation.
pub const REGISTER_TEMPLATE: &str = "user-register";
/// Mail template used for the account recovery link.
pub const RECOVERY_TEMPLATE: &str = "account-recovery";
/// Mail template used to notify the new address after an email change.
pub const EMAIL_CHANGE_TEMPLATE: &str = "email-change";

/// Sensitive account operation a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    AccountDelete,
    PasswordChange,
    UserLogin,
    AccountCreate,
    PasswordReset,
    AccountRecovery,
}

impl Action {
    /// All actions, in wire-contract order.
    pub const ALL: [Action; 6] = [
        Action::AccountDelete,
        Action::PasswordChange,
        Action::UserLogin,
        Action::AccountCreate,
        Action::PasswordReset,
        Action::AccountRecovery,
    ];

    /// Returns the wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountDelete => "account_delete",
            Self::PasswordChange => "password_change",
            Self::UserLogin => "user_login",
            Self::AccountCreate => "account_create",
            Self::PasswordReset => "password_reset",
            Self::AccountRecovery => "account_recovery",
        }
    }

    /// Returns `true` for actions an authenticated user may request for themselves.
    #[must_use]
    pub fn is_self_service(&self) -> bool {
        matches!(
            self,
            Self::AccountDelete | Self::PasswordChange | Self::UserLogin
        )
    }

    /// Returns `true` when the verifier must check the live email against the snapshot.
    ///
    /// Registration tokens precede any possible change, and recovery tokens are
    /// bound to an address the account no longer carries.
    #[must_use]
    pub fn is_identity_sensitive(&self) -> bool {
        !matches!(self, Self::AccountCreate | Self::AccountRecovery)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| TokenError::unknown_action(s))
    }
}

impl TryFrom<&str> for Action {
    type Error = TokenError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Static message metadata for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    /// Subject line and heading of the mail.
    pub title: &'static str,
    /// Completes the sentence "click the button below to ...".
    pub description: &'static str,
    /// Label of the call-to-action button.
    pub button_label: &'static str,
    /// Whether verifying the token also logs the principal in.
    pub implies_login: bool,
    /// Mail body template delivering the token.
    pub template: &'static str,
}

const DESCRIPTORS: [(Action, ActionDescriptor); 6] = [
    (
        Action::AccountDelete,
        ActionDescriptor {
            title: "Account deletion",
            description: "confirm the deletion of your account",
            button_label: "Delete my account",
            implies_login: false,
            template: TOKEN_TEMPLATE,
        },
    ),
    (
        Action::PasswordChange,
        ActionDescriptor {
            title: "Password change",
            description: "change your password",
            button_label: "Change my password",
            implies_login: false,
            template: TOKEN_TEMPLATE,
        },
    ),
    (
        Action::UserLogin,
        ActionDescriptor {
            title: "Login link",
            description: "log in to your account",
            button_label: "Log me in",
            implies_login: true,
            template: TOKEN_TEMPLATE,
        },
    ),
    (
        Action::AccountCreate,
        ActionDescriptor {
            title: "Account creation",
            description: "activate your account",
            button_label: "Activate my account",
            implies_login: false,
            template: REGISTER_TEMPLATE,
        },
    ),
    (
        Action::PasswordReset,
        ActionDescriptor {
            title: "Password reset",
            description: "reset your password",
            button_label: "Reset my password",
            implies_login: false,
            template: TOKEN_TEMPLATE,
        },
    ),
    (
        Action::AccountRecovery,
        ActionDescriptor {
            title: "Account recovery",
            description: "restore your previous email address",
            button_label: "Recover my account",
            implies_login: false,
            template: RECOVERY_TEMPLATE,
        },
    ),
];

/// Maps actions to their message metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionDispatcher;

impl ActionDispatcher {
    /// Creates a dispatcher over the built-in action table.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the descriptor of an action.
    #[must_use]
    pub fn describe(&self, action: Action) -> &'static ActionDescriptor {
        // Table rows follow declaration order.
        &DESCRIPTORS[action as usize].1
    }

    /// Resolves an action by wire name and returns its descriptor.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` if the name is not part of the enumeration.
    pub fn describe_name(&self, name: &str) -> Result<&'static ActionDescriptor, TokenError> {
        let action: Action = name.parse()?;
        Ok(self.describe(action))
    }

    /// Returns `true` if a verified token for this action logs the principal in.
    #[must_use]
    pub fn implies_login(&self, action: Action) -> bool {
        self.describe(action).implies_login
    }
}
