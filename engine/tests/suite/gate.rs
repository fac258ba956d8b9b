//! Events that must not mutate anything.

use rolesync_engine::{DenyReason, EventOutcome, IgnoreReason};
use rolesync_platform::EngineStanding;
use rolesync_types::{ChannelId, GuildId, MenuMode, MessageId, PostingRef, SelectionEvent, UserId};

use crate::common::{
    ACTOR, ADMIN, ENGINE_RANK, ENGINE_USER, FIRE, FakePlatform, Fixture, Op, WATER, token,
};

#[tokio::test]
async fn role_ranked_at_engine_level_is_discarded() {
    let platform = FakePlatform::new();
    platform.set_standing(EngineStanding {
        // FIRE has rank 2.
        highest_rank: 2,
        manage_roles: true,
    });
    let fx = Fixture::build(
        MenuMode::Exclusive,
        vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water")],
        platform,
    )
    .await;
    fx.platform.give_role(ACTOR, WATER);

    let outcome = fx.sync.handle(fx.react(ACTOR, "🔥")).await;

    assert_eq!(
        outcome,
        EventOutcome::Discarded(DenyReason::RoleAboveEngine {
            role_rank: 2,
            engine_rank: 2
        })
    );
    // Nothing granted, and the exclusive cleanup never started either.
    assert_eq!(fx.platform.mutation_count(), 0);
    assert_eq!(fx.platform.count(Op::MemberRoles), 0);
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
}

#[tokio::test]
async fn role_above_engine_is_discarded() {
    let fx = Fixture::build(
        MenuMode::Multi,
        vec![("👑", ADMIN, "Admin")],
        FakePlatform::new(),
    )
    .await;

    let outcome = fx.sync.handle(fx.react(ACTOR, "👑")).await;

    assert_eq!(
        outcome,
        EventOutcome::Discarded(DenyReason::RoleAboveEngine {
            role_rank: 20,
            engine_rank: ENGINE_RANK
        })
    );
    assert_eq!(fx.platform.mutation_count(), 0);
}

#[tokio::test]
async fn missing_manage_roles_is_discarded() {
    let fx = Fixture::elements().await;
    fx.platform.set_standing(EngineStanding {
        highest_rank: ENGINE_RANK,
        manage_roles: false,
    });

    let outcome = fx.sync.handle(fx.react(ACTOR, "🔥")).await;

    assert_eq!(
        outcome,
        EventOutcome::Discarded(DenyReason::MissingManageRoles)
    );
    assert_eq!(fx.platform.mutation_count(), 0);
}

#[tokio::test]
async fn deleted_role_is_discarded() {
    let fx = Fixture::elements().await;
    fx.platform.delete_role(FIRE);

    let outcome = fx.sync.handle(fx.react(ACTOR, "🔥")).await;

    assert_eq!(outcome, EventOutcome::Discarded(DenyReason::RoleMissing));
    assert_eq!(fx.platform.mutation_count(), 0);
}

#[tokio::test]
async fn bots_and_the_engine_itself_are_ignored() {
    let fx = Fixture::elements().await;

    let seeded = fx.sync.handle(fx.react(ENGINE_USER, "🔥")).await;
    let mut bot = fx.react(UserId::new(77), "🔥");
    bot.actor_is_bot = true;
    let bot = fx.sync.handle(bot).await;

    assert_eq!(seeded, EventOutcome::Ignored(IgnoreReason::BotActor));
    assert_eq!(bot, EventOutcome::Ignored(IgnoreReason::BotActor));
    assert_eq!(fx.platform.count(Op::Standing), 0);
}

#[tokio::test]
async fn unknown_posting_is_ignored() {
    let fx = Fixture::elements().await;
    let elsewhere = PostingRef::new(GuildId::new(9), ChannelId::new(9), MessageId::new(9));

    let outcome = fx
        .sync
        .handle(SelectionEvent::add(ACTOR, elsewhere, token("🔥")))
        .await;

    assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::UnknownMenu));
    assert_eq!(fx.platform.count(Op::Standing), 0);
}

#[tokio::test]
async fn spectator_mark_is_ignored() {
    let fx = Fixture::elements().await;

    let outcome = fx.sync.handle(fx.react(ACTOR, "👀")).await;

    assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::UnknownOption));
    assert_eq!(fx.platform.count(Op::Standing), 0);
    assert_eq!(fx.platform.mutation_count(), 0);
}
