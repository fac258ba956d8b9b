//! Per-(actor, posting) processing lock.
//!
//! Holding a [`ProcessingGuard`] means no other event for the same actor on
//! the same posting is being processed. Contenders are turned away rather
//! than queued; a later event reconciles whatever the dropped one would have
//! done.

use std::sync::Arc;

use dashmap::DashSet;

use rolesync_types::{PostingRef, UserId};

type LockKey = (UserId, PostingRef);

#[derive(Debug, Clone, Default)]
pub struct EventDeduplicator {
    held: Arc<DashSet<LockKey>>,
}

impl EventDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `(actor, posting)`, or `None` if an event for that
    /// pair is already in flight.
    #[must_use]
    pub fn try_acquire(&self, actor: UserId, posting: PostingRef) -> Option<ProcessingGuard> {
        let key = (actor, posting);
        if !self.held.insert(key) {
            return None;
        }
        Some(ProcessingGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    #[must_use]
    pub fn is_held(&self, actor: UserId, posting: PostingRef) -> bool {
        self.held.contains(&(actor, posting))
    }

    /// Number of pairs currently being processed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.held.len()
    }
}

/// Releases its `(actor, posting)` pair when dropped, on every exit path.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ProcessingGuard {
    held: Arc<DashSet<LockKey>>,
    key: LockKey,
}

impl ProcessingGuard {
    #[must_use]
    pub fn actor(&self) -> UserId {
        self.key.0
    }

    #[must_use]
    pub fn posting(&self) -> PostingRef {
        self.key.1
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}
