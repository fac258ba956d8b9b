//! Idempotent grant/revoke of a single role.
//!
//! Every attempt rereads the member's roles before mutating, so a duplicate
//! or reordered event converges instead of issuing a second write.

use std::sync::Arc;

use rolesync_platform::{Platform, PlatformError, RetryPolicy, run_with_retry};
use rolesync_types::{GuildId, RoleId, UserId};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Granted,
    AlreadyHeld,
    Revoked,
    NotHeld,
}

impl MembershipChange {
    /// Whether a mutation reached the platform.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Granted | Self::Revoked)
    }
}

pub struct MembershipMutator {
    platform: Arc<dyn Platform>,
    policy: RetryPolicy,
}

impl MembershipMutator {
    pub fn new(platform: Arc<dyn Platform>, policy: RetryPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn grant(
        &self,
        guild: GuildId,
        actor: UserId,
        role: RoleId,
    ) -> Result<MembershipChange, SyncError> {
        let outcome = run_with_retry("grant_role", &self.policy, || {
            self.grant_once(guild, actor, role)
        })
        .await;
        report("grant_role", actor, role, SyncError::from_retry("grant_role", outcome))
    }

    pub async fn revoke(
        &self,
        guild: GuildId,
        actor: UserId,
        role: RoleId,
    ) -> Result<MembershipChange, SyncError> {
        let outcome = run_with_retry("revoke_role", &self.policy, || {
            self.revoke_once(guild, actor, role)
        })
        .await;
        report(
            "revoke_role",
            actor,
            role,
            SyncError::from_retry("revoke_role", outcome),
        )
    }

    async fn grant_once(
        &self,
        guild: GuildId,
        actor: UserId,
        role: RoleId,
    ) -> Result<MembershipChange, PlatformError> {
        let held = self.platform.member_roles(guild, actor).await?;
        if held.contains(&role) {
            return Ok(MembershipChange::AlreadyHeld);
        }
        self.platform.add_member_role(guild, actor, role).await?;
        Ok(MembershipChange::Granted)
    }

    async fn revoke_once(
        &self,
        guild: GuildId,
        actor: UserId,
        role: RoleId,
    ) -> Result<MembershipChange, PlatformError> {
        let held = self.platform.member_roles(guild, actor).await?;
        if !held.contains(&role) {
            return Ok(MembershipChange::NotHeld);
        }
        self.platform.remove_member_role(guild, actor, role).await?;
        Ok(MembershipChange::Revoked)
    }
}

fn report(
    operation: &'static str,
    actor: UserId,
    role: RoleId,
    result: Result<MembershipChange, SyncError>,
) -> Result<MembershipChange, SyncError> {
    match &result {
        Ok(change) if change.is_applied() => {
            tracing::info!(actor = %actor, role = %role, ?change, "Membership updated");
        }
        Ok(change) => {
            tracing::debug!(actor = %actor, role = %role, ?change, "Membership already converged");
        }
        Err(error) => {
            tracing::warn!(actor = %actor, role = %role, operation, %error, "Membership change abandoned");
        }
    }
    result
}
