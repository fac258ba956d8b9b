//! Best-effort removal of a stale mark from a posting.
//!
//! Memberships are the source of truth; a leftover mark is cosmetic. Each
//! attempt rechecks whether the actor still shows the mark, so an actor who
//! already removed it costs one read and no write.

use std::sync::Arc;

use rolesync_platform::{Platform, PlatformError, RetryPolicy, run_with_retry};
use rolesync_types::{PostingRef, Token, UserId};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkChange {
    Removed,
    /// The actor no longer showed the mark.
    Absent,
}

pub struct MarkMutator {
    platform: Arc<dyn Platform>,
    policy: RetryPolicy,
}

impl MarkMutator {
    pub fn new(platform: Arc<dyn Platform>, policy: RetryPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn remove_mark(
        &self,
        posting: PostingRef,
        actor: UserId,
        token: &Token,
    ) -> Result<MarkChange, SyncError> {
        let outcome = run_with_retry("remove_mark", &self.policy, || {
            self.remove_once(posting, actor, token)
        })
        .await;

        let result = SyncError::from_retry("remove_mark", outcome);
        match &result {
            Ok(change) => {
                tracing::debug!(posting = %posting, actor = %actor, token = %token, ?change, "Mark cleanup done");
            }
            Err(error) if error.is_exhausted() => {
                tracing::warn!(posting = %posting, actor = %actor, token = %token, %error, "Mark cleanup abandoned");
            }
            Err(error) => {
                // Posting or emoji is gone; nothing left to clean.
                tracing::debug!(posting = %posting, actor = %actor, token = %token, %error, "Mark cleanup skipped");
            }
        }
        result
    }

    async fn remove_once(
        &self,
        posting: PostingRef,
        actor: UserId,
        token: &Token,
    ) -> Result<MarkChange, PlatformError> {
        if !self.platform.has_mark(posting, token, actor).await? {
            return Ok(MarkChange::Absent);
        }
        self.platform.remove_mark(posting, token, actor).await?;
        Ok(MarkChange::Removed)
    }
}
