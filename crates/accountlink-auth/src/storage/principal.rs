//! Principal lookup trait.

use async_trait::async_trait;

use crate::TokenResult;
use crate::principal::Principal;

/// Read access to the current state of principals.
///
/// Verified claims only carry a snapshot; callers re-fetch the live
/// principal by id before acting on a token.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Finds a principal by id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn find_by_id(&self, id: u64) -> TokenResult<Option<Principal>>;

    /// Finds a principal by email address.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn find_by_email(&self, email: &str) -> TokenResult<Option<Principal>>;
}
