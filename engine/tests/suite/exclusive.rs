//! Exclusive-mode scenarios: at most one of the menu's roles survives.

use rolesync_engine::{EventOutcome, MarkChange, MembershipChange, ProcessReport};
use rolesync_platform::{PlatformError, TerminalKind};
use rolesync_types::{MenuMode, SelectionEvent};

use crate::common::{ACTOR, EARTH, FIRE, FakePlatform, Fixture, OTHER_ACTOR, Op, WATER, token};

fn processed(outcome: EventOutcome) -> ProcessReport {
    match outcome {
        EventOutcome::Processed(report) => report,
        other => panic!("expected Processed, got {other:?}"),
    }
}

#[tokio::test]
async fn fire_then_water_then_release_water() {
    let fx = Fixture::elements().await;

    let report = processed(fx.sync.handle(fx.react(ACTOR, "🔥")).await);
    assert_eq!(report.change, MembershipChange::Granted);
    assert_eq!(fx.menu_roles(ACTOR), vec![FIRE]);

    let report = processed(fx.sync.handle(fx.react(ACTOR, "💧")).await);
    assert_eq!(report.change, MembershipChange::Granted);
    assert_eq!(report.cleanup.len(), 1);
    assert_eq!(report.cleanup[0].option.role, FIRE);
    assert_eq!(report.cleanup[0].membership, Ok(MembershipChange::Revoked));
    assert_eq!(report.cleanup[0].mark, Ok(MarkChange::Removed));
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
    assert!(!fx.shows(ACTOR, "🔥"));
    assert!(fx.shows(ACTOR, "💧"));

    let report = processed(fx.sync.handle(fx.unreact(ACTOR, "💧")).await);
    assert_eq!(report.change, MembershipChange::Revoked);
    assert!(report.cleanup.is_empty());
    assert!(fx.menu_roles(ACTOR).is_empty());
}

#[tokio::test]
async fn echo_of_engine_mark_removal_is_harmless() {
    let fx = Fixture::elements().await;
    fx.sync.handle(fx.react(ACTOR, "🔥")).await;
    fx.sync.handle(fx.react(ACTOR, "💧")).await;

    // The platform reports the engine's own 🔥 removal as a remove event.
    let echo = SelectionEvent::remove(ACTOR, fx.posting, token("🔥"));
    let removes_before = fx.platform.count(Op::RemoveRole);
    let report = processed(fx.sync.handle(echo).await);

    assert_eq!(report.change, MembershipChange::NotHeld);
    assert_eq!(fx.platform.count(Op::RemoveRole), removes_before);
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
}

#[tokio::test]
async fn later_pick_wins_when_both_marks_precede_processing() {
    // The actor picks 🔥 then 💧 before the engine sees either event.
    let fx = Fixture::elements().await;
    let fire = fx.react(ACTOR, "🔥");
    let water = fx.react(ACTOR, "💧");

    let first = processed(fx.sync.handle(fire).await);
    let second = processed(fx.sync.handle(water).await);

    assert_eq!(first.change, MembershipChange::Granted);
    assert_eq!(second.change, MembershipChange::Granted);
    assert_eq!(second.cleanup[0].membership, Ok(MembershipChange::Revoked));
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
    assert!(!fx.shows(ACTOR, "🔥"));
}

#[tokio::test]
async fn processing_order_decides_the_surviving_pick() {
    let in_order = Fixture::elements().await;
    let fire = in_order.react(ACTOR, "🔥");
    let water = in_order.react(ACTOR, "💧");
    processed(in_order.sync.handle(fire).await);
    processed(in_order.sync.handle(water).await);

    let reversed = Fixture::elements().await;
    let fire = reversed.react(ACTOR, "🔥");
    let water = reversed.react(ACTOR, "💧");
    processed(reversed.sync.handle(water).await);
    processed(reversed.sync.handle(fire).await);

    assert_eq!(in_order.menu_roles(ACTOR), vec![WATER]);
    assert_eq!(reversed.menu_roles(ACTOR), vec![FIRE]);
    assert!(!reversed.shows(ACTOR, "💧"));
}

#[tokio::test]
async fn add_is_granted_before_the_mark_is_listed() {
    let fx = Fixture::elements().await;
    fx.sync.handle(fx.react(ACTOR, "💧")).await;

    // The reaction listing has not caught up with the new 🔥 mark yet.
    let fire = SelectionEvent::add(ACTOR, fx.posting, token("🔥"));
    let report = processed(fx.sync.handle(fire).await);

    assert_eq!(report.change, MembershipChange::Granted);
    assert_eq!(fx.platform.count(Op::AddRole), 2);
    assert_eq!(fx.menu_roles(ACTOR), vec![FIRE]);
}

#[tokio::test]
async fn clears_every_previously_held_option() {
    let fx = Fixture::build(
        MenuMode::Exclusive,
        vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water"), ("🌱", EARTH, "Earth")],
        FakePlatform::new(),
    )
    .await;
    // Held from before the menu became exclusive.
    fx.platform.give_role(ACTOR, FIRE);
    fx.platform.give_role(ACTOR, WATER);

    let report = processed(fx.sync.handle(fx.react(ACTOR, "🌱")).await);

    assert_eq!(report.cleanup.len(), 2);
    assert!(report.cleanup.iter().all(|c| c.role_cleared()));
    // Marks were never shown, so cleanup only read them.
    assert!(
        report
            .cleanup
            .iter()
            .all(|c| c.mark == Ok(MarkChange::Absent))
    );
    assert_eq!(fx.menu_roles(ACTOR), vec![EARTH]);
    assert_eq!(fx.platform.count(Op::RemoveMark), 0);
}

#[tokio::test]
async fn other_actors_are_untouched() {
    let fx = Fixture::elements().await;
    fx.sync.handle(fx.react(OTHER_ACTOR, "🔥")).await;
    fx.sync.handle(fx.react(ACTOR, "💧")).await;

    assert_eq!(fx.menu_roles(OTHER_ACTOR), vec![FIRE]);
    assert!(fx.shows(OTHER_ACTOR, "🔥"));
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
}

#[tokio::test]
async fn mark_failure_never_blocks_revocation() {
    let fx = Fixture::elements().await;
    fx.sync.handle(fx.react(ACTOR, "🔥")).await;
    fx.platform.fail(
        Op::RemoveMark,
        PlatformError::terminal(TerminalKind::UnknownEmoji, "Unknown Emoji"),
        1,
    );

    let report = processed(fx.sync.handle(fx.react(ACTOR, "💧")).await);

    let cleanup = &report.cleanup[0];
    assert_eq!(cleanup.membership, Ok(MembershipChange::Revoked));
    assert!(cleanup.mark.is_err());
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
    // Cosmetic leftover only.
    assert!(fx.shows(ACTOR, "🔥"));
}

#[tokio::test]
async fn one_failed_revocation_does_not_stop_the_rest() {
    let fx = Fixture::build(
        MenuMode::Exclusive,
        vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water"), ("🌱", EARTH, "Earth")],
        FakePlatform::new(),
    )
    .await;
    fx.platform.give_role(ACTOR, FIRE);
    fx.platform.give_role(ACTOR, WATER);
    fx.platform.fail(
        Op::RemoveRole,
        PlatformError::terminal(TerminalKind::MissingPermissions, "Missing Permissions"),
        1,
    );

    let report = processed(fx.sync.handle(fx.react(ACTOR, "🌱")).await);

    assert_eq!(report.change, MembershipChange::Granted);
    let failed: Vec<_> = report.cleanup.iter().filter(|c| !c.role_cleared()).collect();
    assert_eq!(failed.len(), 1);
    // Exactly one of the two stale roles was revoked.
    assert_eq!(fx.menu_roles(ACTOR).len(), 2);
    assert!(fx.menu_roles(ACTOR).contains(&EARTH));
    assert_eq!(fx.platform.count(Op::RemoveRole), 2);
}

#[tokio::test]
async fn multi_mode_keeps_every_selection() {
    let fx = Fixture::build(
        MenuMode::Multi,
        vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water")],
        FakePlatform::new(),
    )
    .await;

    fx.sync.handle(fx.react(ACTOR, "🔥")).await;
    let report = processed(fx.sync.handle(fx.react(ACTOR, "💧")).await);

    assert!(report.cleanup.is_empty());
    assert_eq!(fx.menu_roles(ACTOR), vec![FIRE, WATER]);
    assert!(fx.shows(ACTOR, "🔥"));

    fx.sync.handle(fx.unreact(ACTOR, "🔥")).await;
    assert_eq!(fx.menu_roles(ACTOR), vec![WATER]);
}
