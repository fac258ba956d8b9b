//! Duplicate and no-op events converge without extra writes.

use rolesync_engine::{EventOutcome, MembershipChange};
use rolesync_types::MenuMode;

use crate::common::{ACTOR, FIRE, FakePlatform, Fixture, Op, WATER};

#[tokio::test]
async fn repeated_add_grants_once() {
    let fx = Fixture::elements().await;

    let first = fx.sync.handle(fx.react(ACTOR, "🔥")).await;
    let second = fx.sync.handle(fx.react(ACTOR, "🔥")).await;

    assert!(matches!(
        first,
        EventOutcome::Processed(ref r) if r.change == MembershipChange::Granted
    ));
    assert!(matches!(
        second,
        EventOutcome::Processed(ref r) if r.change == MembershipChange::AlreadyHeld
    ));
    assert_eq!(fx.platform.count(Op::AddRole), 1);
    assert_eq!(fx.menu_roles(ACTOR), vec![FIRE]);
}

#[tokio::test]
async fn remove_without_hold_is_a_no_op() {
    let fx = Fixture::elements().await;

    let outcome = fx.sync.handle(fx.unreact(ACTOR, "💧")).await;

    assert!(matches!(
        outcome,
        EventOutcome::Processed(ref r) if r.change == MembershipChange::NotHeld
    ));
    assert_eq!(fx.platform.mutation_count(), 0);
}

#[tokio::test]
async fn exclusive_remove_touches_only_its_option() {
    let fx = Fixture::elements().await;
    fx.platform.give_role(ACTOR, FIRE);
    fx.platform.give_role(ACTOR, WATER);

    fx.sync.handle(fx.unreact(ACTOR, "💧")).await;

    assert_eq!(fx.menu_roles(ACTOR), vec![FIRE]);
    assert_eq!(fx.platform.count(Op::RemoveRole), 1);
    assert_eq!(fx.platform.count(Op::RemoveMark), 0);
}

#[tokio::test]
async fn multi_mode_duplicate_add_and_remove_pairs_settle() {
    let fx = Fixture::build(
        MenuMode::Multi,
        vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water")],
        FakePlatform::new(),
    )
    .await;

    for _ in 0..2 {
        fx.sync.handle(fx.react(ACTOR, "💧")).await;
    }
    for _ in 0..2 {
        fx.sync.handle(fx.unreact(ACTOR, "💧")).await;
    }

    assert!(fx.menu_roles(ACTOR).is_empty());
    assert_eq!(fx.platform.count(Op::AddRole), 1);
    assert_eq!(fx.platform.count(Op::RemoveRole), 1);
}
