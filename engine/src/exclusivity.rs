//! Single-select cleanup.
//!
//! When an actor picks one option of an exclusive menu, every other option
//! must end with the actor neither holding its role nor showing its mark.
//! All revocations run concurrently, and each option's mark removal runs
//! alongside its revocation; a failed mark never affects a revocation.

use std::sync::Arc;

use futures_util::future::join_all;

use rolesync_types::{GuildId, MenuDefinition, MenuOption, PostingRef, Token, UserId};

use crate::error::SyncError;
use crate::marks::{MarkChange, MarkMutator};
use crate::membership::{MembershipChange, MembershipMutator};

/// What happened to one of the options the actor did not pick.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionCleanup {
    pub option: MenuOption,
    pub membership: Result<MembershipChange, SyncError>,
    pub mark: Result<MarkChange, SyncError>,
}

impl OptionCleanup {
    /// Whether the role is confirmed not held afterwards.
    #[must_use]
    pub fn role_cleared(&self) -> bool {
        self.membership.is_ok()
    }
}

pub struct ExclusivityEnforcer {
    membership: Arc<MembershipMutator>,
    marks: Arc<MarkMutator>,
}

impl ExclusivityEnforcer {
    pub fn new(membership: Arc<MembershipMutator>, marks: Arc<MarkMutator>) -> Self {
        Self { membership, marks }
    }

    /// Clear every option of `menu` except the one selected by `keep`.
    pub async fn enforce(
        &self,
        menu: &MenuDefinition,
        posting: PostingRef,
        actor: UserId,
        keep: &Token,
    ) -> Vec<OptionCleanup> {
        let guild = posting.guild;
        let cleanups = menu
            .others(keep)
            .map(|option| self.clear_option(guild, posting, actor, option));
        let results = join_all(cleanups).await;

        let failed = results.iter().filter(|c| !c.role_cleared()).count();
        if failed > 0 {
            tracing::warn!(
                actor = %actor,
                posting = %posting,
                failed,
                "Exclusive cleanup left roles in place"
            );
        }
        results
    }

    async fn clear_option(
        &self,
        guild: GuildId,
        posting: PostingRef,
        actor: UserId,
        option: &MenuOption,
    ) -> OptionCleanup {
        let (membership, mark) = tokio::join!(
            self.membership.revoke(guild, actor, option.role),
            self.marks.remove_mark(posting, actor, &option.token),
        );
        OptionCleanup {
            option: option.clone(),
            membership,
            mark,
        }
    }
}
