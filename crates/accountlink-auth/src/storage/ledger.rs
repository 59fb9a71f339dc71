//! Consumed token ledger trait.
//!
//! Tokens are stateless, so a still-valid token could be replayed to repeat
//! its action. When single-use is enabled the verifier records each token's
//! `jti` here on consumption and refuses it afterwards.
//!
//! # Implementation Notes
//!
//! `mark_consumed` must check and record in one atomic step so that two
//! concurrent requests with the same token cannot both succeed. Entries can
//! be dropped once their `expires_at` has passed, since the window check
//! rejects the token from then on.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::TokenResult;

/// Storage trait for consumed token ids.
#[async_trait]
pub trait ConsumedTokenLedger: Send + Sync {
    /// Atomically records `jti` as consumed if it was not already.
    ///
    /// Returns `true` on first consumption and `false` if the token was
    /// already consumed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the operation fails.
    async fn mark_consumed(&self, jti: &str, expires_at: OffsetDateTime) -> TokenResult<bool>;

    /// Checks whether `jti` has been consumed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn is_consumed(&self, jti: &str) -> TokenResult<bool>;

    /// Deletes entries whose tokens expired before `now`.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the cleanup fails.
    async fn cleanup_expired(&self, now: OffsetDateTime) -> TokenResult<u64>;
}
