//! Client side of the external platform that owns memberships, postings and
//! toggle marks.
//!
//! # Architecture
//!
//! - [`Platform`] - the narrow async seam the engine calls through. Every
//!   method is a suspension point and may fail with a [`PlatformError`].
//! - [`retry`] - the single bounded-retry policy shared by every mutator.
//! - [`discord`] - REST implementation of [`Platform`].
//!
//! # Error Classification
//!
//! Every failure is classified at the call site that observed it:
//!
//! | Variant | Examples | Handling |
//! |---------|----------|----------|
//! | `Transient` | rate limit, timeout, 5xx, connection reset | retried with backoff |
//! | `Terminal` | unknown role/member/message/emoji, missing permissions | abandoned |

pub mod discord;
pub mod retry;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rolesync_types::{GuildId, PostingRef, RoleId, Token, UserId};

pub use discord::{DiscordClient, DiscordClientConfig, DiscordClientError};
pub use retry::{RetryOutcome, RetryPolicy, run_with_retry};

/// Platform call future type alias.
pub type PlatformFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, PlatformError>> + Send + 'a>>;

/// Why a platform call can never succeed as issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    UnknownGuild,
    UnknownChannel,
    UnknownMessage,
    UnknownMember,
    UnknownUser,
    UnknownRole,
    UnknownEmoji,
    MissingPermissions,
    Unauthorized,
    /// Request could not be built or sent and retrying cannot help.
    Transport,
    /// Any other non-retryable rejection, by HTTP status.
    Rejected { status: u16 },
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGuild => f.write_str("unknown guild"),
            Self::UnknownChannel => f.write_str("unknown channel"),
            Self::UnknownMessage => f.write_str("unknown message"),
            Self::UnknownMember => f.write_str("unknown member"),
            Self::UnknownUser => f.write_str("unknown user"),
            Self::UnknownRole => f.write_str("unknown role"),
            Self::UnknownEmoji => f.write_str("unknown emoji"),
            Self::MissingPermissions => f.write_str("missing permissions"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Transport => f.write_str("transport failure"),
            Self::Rejected { status } => write!(f, "rejected with status {status}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("transient platform failure: {reason}")]
    Transient {
        reason: String,
        /// Server-provided wait before the next attempt, when known.
        retry_after: Option<Duration>,
    },
    #[error("{kind}: {reason}")]
    Terminal { kind: TerminalKind, reason: String },
}

impl PlatformError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::Transient {
            reason: "rate limited".to_string(),
            retry_after,
        }
    }

    pub fn terminal(kind: TerminalKind, reason: impl Into<String>) -> Self {
        Self::Terminal {
            kind,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Terminal { .. } => None,
        }
    }

    #[must_use]
    pub const fn terminal_kind(&self) -> Option<TerminalKind> {
        match self {
            Self::Terminal { kind, .. } => Some(*kind),
            Self::Transient { .. } => None,
        }
    }
}

/// What the engine's own identity is allowed to do in one space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStanding {
    /// Position of the engine's highest role; roles strictly below it are manageable.
    pub highest_rank: i64,
    /// Whether the engine holds the generic "manage roles" capability.
    pub manage_roles: bool,
}

/// The external membership/posting service.
///
/// Implementations perform exactly one remote attempt per call and classify
/// failures; retrying is the caller's decision (see [`retry`]).
pub trait Platform: Send + Sync {
    /// The engine's own user.
    fn current_user(&self) -> PlatformFut<'_, UserId>;

    /// Snapshot of the groups `user` currently holds in `guild`.
    fn member_roles(&self, guild: GuildId, user: UserId) -> PlatformFut<'_, Vec<RoleId>>;

    fn engine_standing(&self, guild: GuildId) -> PlatformFut<'_, EngineStanding>;

    /// Rank of `role`, or `None` when the role no longer exists.
    fn role_rank(&self, guild: GuildId, role: RoleId) -> PlatformFut<'_, Option<i64>>;

    fn add_member_role(&self, guild: GuildId, user: UserId, role: RoleId) -> PlatformFut<'_, ()>;

    fn remove_member_role(&self, guild: GuildId, user: UserId, role: RoleId)
    -> PlatformFut<'_, ()>;

    /// Whether `user` currently shows `token` on the posting.
    fn has_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, bool>;

    fn remove_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, ()>;
}
