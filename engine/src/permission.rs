//! Can the engine's own identity grant or revoke a role?
//!
//! Three conditions, checked in order: the role still exists, the engine
//! holds the manage-roles capability, and the role ranks strictly below the
//! engine's highest role. A denial is an expected configuration state, not
//! an error worth more than a debug line.

use std::sync::Arc;

use rolesync_platform::{EngineStanding, Platform, RetryPolicy, run_with_retry};
use rolesync_types::{GuildId, RoleId};

use crate::error::{DenyReason, SyncError};

pub struct PermissionGate {
    platform: Arc<dyn Platform>,
    policy: RetryPolicy,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn Platform>, policy: RetryPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn can_manage(&self, guild: GuildId, role: RoleId) -> Result<(), SyncError> {
        let (standing, rank) = tokio::join!(
            run_with_retry("engine_standing", &self.policy, || {
                self.platform.engine_standing(guild)
            }),
            run_with_retry("role_rank", &self.policy, || {
                self.platform.role_rank(guild, role)
            }),
        );
        let standing = SyncError::from_retry("engine_standing", standing)?;
        let rank = SyncError::from_retry("role_rank", rank)?;

        match decide(standing, rank) {
            Some(reason) => {
                tracing::debug!(guild = %guild, role = %role, %reason, "Role not manageable");
                Err(SyncError::PermissionDenied(reason))
            }
            None => Ok(()),
        }
    }
}

fn decide(standing: EngineStanding, role_rank: Option<i64>) -> Option<DenyReason> {
    let Some(role_rank) = role_rank else {
        return Some(DenyReason::RoleMissing);
    };
    if !standing.manage_roles {
        return Some(DenyReason::MissingManageRoles);
    }
    if role_rank >= standing.highest_rank {
        return Some(DenyReason::RoleAboveEngine {
            role_rank,
            engine_rank: standing.highest_rank,
        });
    }
    None
}
