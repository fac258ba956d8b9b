use serde::{Deserialize, Serialize};

use crate::{PostingRef, Token, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Add,
    Remove,
}

/// A toggle-mark notification from the platform.
///
/// Produced once per external signal; the transport may still deliver
/// duplicates, which the engine absorbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub actor: UserId,
    pub posting: PostingRef,
    pub token: Token,
    pub kind: SelectionKind,
    /// Set by the relay when the actor is a bot account.
    #[serde(default)]
    pub actor_is_bot: bool,
}

impl SelectionEvent {
    #[must_use]
    pub fn add(actor: UserId, posting: PostingRef, token: Token) -> Self {
        Self {
            actor,
            posting,
            token,
            kind: SelectionKind::Add,
            actor_is_bot: false,
        }
    }

    #[must_use]
    pub fn remove(actor: UserId, posting: PostingRef, token: Token) -> Self {
        Self {
            actor,
            posting,
            token,
            kind: SelectionKind::Remove,
            actor_is_bot: false,
        }
    }
}
