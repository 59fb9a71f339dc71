//! User-facing acknowledgments.
//!
//! Handlers record a notice after each issuance or confirmation. The
//! surrounding UI drains them with [`FlashNotifier::take`] on the next page.

use std::collections::VecDeque;

use accountlink_auth::Principal;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::NotificationError;

/// Pending notices kept per principal. Older ones are dropped first.
pub const NOTICE_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        principal: &Principal,
        kind: NoticeKind,
        message: &str,
    ) -> Result<(), NotificationError>;
}

/// Keeps pending notices per principal until they are read.
#[derive(Debug, Default)]
pub struct FlashNotifier {
    notices: DashMap<u64, VecDeque<Notice>>,
}

impl FlashNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the pending notices of `principal_id`, oldest first.
    pub fn take(&self, principal_id: u64) -> Vec<Notice> {
        self.notices
            .remove(&principal_id)
            .map(|(_, notices)| Vec::from(notices))
            .unwrap_or_default()
    }

    pub fn pending(&self, principal_id: u64) -> usize {
        self.notices
            .get(&principal_id)
            .map_or(0, |notices| notices.len())
    }
}

#[async_trait]
impl Notifier for FlashNotifier {
    async fn notify(
        &self,
        principal: &Principal,
        kind: NoticeKind,
        message: &str,
    ) -> Result<(), NotificationError> {
        let id = principal.id().ok_or(NotificationError::RecipientNotFound)?;

        tracing::debug!(principal_id = id, kind = ?kind, "Notice recorded");
        let mut pending = self.notices.entry(id).or_default();
        if pending.len() == NOTICE_CAPACITY {
            pending.pop_front();
        }
        pending.push_back(Notice {
            kind,
            message: message.to_string(),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }
}
