use std::fmt;

use rolesync_platform::{PlatformError, RetryOutcome};
use rolesync_types::{MenuId, PostingRef};

/// Why an event was ignored without touching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The actor is a bot, or the engine itself seeding its own marks.
    BotActor,
    /// No menu is published at the posting.
    UnknownMenu,
    /// The mark is not one of the menu's options.
    UnknownOption,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BotActor => f.write_str("bot actor"),
            Self::UnknownMenu => f.write_str("no menu at posting"),
            Self::UnknownOption => f.write_str("mark is not a menu option"),
        }
    }
}

/// Why the engine may not manage a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The engine lacks the generic manage-roles capability.
    MissingManageRoles,
    /// The role sits at or above the engine's highest role.
    RoleAboveEngine { role_rank: i64, engine_rank: i64 },
    /// The role no longer exists.
    RoleMissing,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingManageRoles => f.write_str("engine lacks manage-roles"),
            Self::RoleAboveEngine {
                role_rank,
                engine_rank,
            } => write!(
                f,
                "role rank {role_rank} is not below engine rank {engine_rank}"
            ),
            Self::RoleMissing => f.write_str("role no longer exists"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("menu lookup for {posting} failed: {reason}")]
    Lookup { posting: PostingRef, reason: String },
    #[error("menu store failed: {reason}")]
    Store { reason: String },
    #[error("menu {menu} came back from the store without a posting")]
    Unpublished { menu: MenuId },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("permission denied: {0}")]
    PermissionDenied(DenyReason),
    /// A platform call was abandoned, terminally or after the retry budget.
    #[error("{operation} abandoned after {attempts} attempt(s): {source}")]
    Platform {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: PlatformError,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SyncError {
    /// Collapse a retried platform call into the engine's error type.
    pub(crate) fn from_retry<T>(
        operation: &'static str,
        outcome: RetryOutcome<T>,
    ) -> Result<T, Self> {
        match outcome {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::Terminal { attempts, error }
            | RetryOutcome::Exhausted { attempts, error } => Err(Self::Platform {
                operation,
                attempts,
                source: error,
            }),
        }
    }

    /// Whether the retry budget ran out, as opposed to a terminal rejection.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Platform { source, .. } if source.is_transient())
    }

    #[must_use]
    pub const fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::PermissionDenied(reason) => Some(*reason),
            _ => None,
        }
    }

    /// The platform failure behind this error, if any.
    #[must_use]
    pub const fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            Self::Platform { source, .. } => Some(source),
            _ => None,
        }
    }
}
