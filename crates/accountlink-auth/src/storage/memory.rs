//! In-memory consumed token ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::TokenResult;
use crate::storage::ledger::ConsumedTokenLedger;

/// [`ConsumedTokenLedger`] backed by a concurrent map.
///
/// State is lost on restart, so it suits single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    consumed: DashMap<String, OffsetDateTime>,
}

impl MemoryTokenLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    /// Returns `true` if no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

#[async_trait]
impl ConsumedTokenLedger for MemoryTokenLedger {
    async fn mark_consumed(&self, jti: &str, expires_at: OffsetDateTime) -> TokenResult<bool> {
        match self.consumed.entry(jti.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_consumed(&self, jti: &str) -> TokenResult<bool> {
        Ok(self.consumed.contains_key(jti))
    }

    async fn cleanup_expired(&self, now: OffsetDateTime) -> TokenResult<u64> {
        let before = self.consumed.len();
        self.consumed.retain(|_, expires_at| *expires_at > now);
        Ok((before - self.consumed.len()) as u64)
    }
}
