//! Principal snapshot.
//!
//! A [`Principal`] is an immutable copy of the user a token concerns, taken
//! at issuance time. Later changes to the live account never leak into it.

use serde::{Deserialize, Serialize};

/// Identity snapshot of the user a token concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    id: Option<u64>,
    username: String,
    email: String,
}

impl Principal {
    /// Creates a snapshot of a persisted user.
    #[must_use]
    pub fn new(id: u64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: username.into(),
            email: email.into(),
        }
    }

    /// Creates a snapshot of a user that has no identifier yet.
    ///
    /// Tokens cannot be issued for such a principal.
    #[must_use]
    pub fn unsaved(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
        }
    }

    /// Returns the numeric identifier, if the user has been persisted.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns a new snapshot carrying a different email address.
    #[must_use]
    pub fn with_email(&self, email: impl Into<String>) -> Self {
        Self {
            id: self.id,
            username: self.username.clone(),
            email: email.into(),
        }
    }

    /// Returns `true` if both snapshots refer to the same persisted user.
    #[must_use]
    pub fn same_identity(&self, other: &Principal) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}
