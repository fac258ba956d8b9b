//! Event dispatch: one [`SelectionEvent`] in, one [`EventOutcome`] out.
//!
//! ```text
//! Received -> actor check (bot -> Ignored)
//!          -> dedup gate (held -> Dropped)
//!          -> lookup (miss -> Ignored)
//!          -> resolve (miss -> Ignored)
//!          -> permission (denied -> Discarded)
//!          -> Exclusive add: grant || cleanup others
//!             otherwise:     grant or revoke
//!          -> release gate
//! ```
//!
//! Nothing is ever reported back to the event source; outcomes exist for
//! logging and tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use rolesync_platform::{Platform, RetryPolicy};
use rolesync_types::{MenuDefinition, MenuMode, MenuOption, SelectionEvent, SelectionKind, UserId};

use crate::dedup::EventDeduplicator;
use crate::error::{DenyReason, IgnoreReason, SyncError};
use crate::exclusivity::{ExclusivityEnforcer, OptionCleanup};
use crate::marks::MarkMutator;
use crate::membership::{MembershipChange, MembershipMutator};
use crate::permission::PermissionGate;
use crate::registry::MenuRegistry;
use crate::resolver::resolve;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Policy for membership reads and writes (including the permission check).
    pub membership_retry: RetryPolicy,
    pub mark_retry: RetryPolicy,
    /// The engine's own user; its marks are never processed.
    pub self_user: Option<UserId>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            membership_retry: RetryPolicy::membership(),
            mark_retry: RetryPolicy::marks(),
            self_user: None,
        }
    }
}

/// Result of a processed event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub option: MenuOption,
    pub change: MembershipChange,
    /// Exclusive-mode cleanup of the other options; empty otherwise.
    pub cleanup: Vec<OptionCleanup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Another event for the same actor and posting was in flight.
    Dropped,
    Ignored(IgnoreReason),
    Discarded(DenyReason),
    Failed(SyncError),
    Processed(ProcessReport),
}

/// Tally of outcomes over one [`Synchronizer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub dropped: usize,
    pub ignored: usize,
    pub discarded: usize,
    pub failed: usize,
    /// Tasks that panicked or were cancelled.
    pub aborted: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Processed(_) => self.processed += 1,
            EventOutcome::Dropped => self.dropped += 1,
            EventOutcome::Ignored(_) => self.ignored += 1,
            EventOutcome::Discarded(_) => self.discarded += 1,
            EventOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct Synchronizer {
    registry: Arc<MenuRegistry>,
    dedup: EventDeduplicator,
    gate: PermissionGate,
    membership: Arc<MembershipMutator>,
    exclusivity: ExclusivityEnforcer,
    self_user: Option<UserId>,
}

impl Synchronizer {
    pub fn new(
        platform: Arc<dyn Platform>,
        registry: Arc<MenuRegistry>,
        settings: SyncSettings,
    ) -> Self {
        let membership = Arc::new(MembershipMutator::new(
            Arc::clone(&platform),
            settings.membership_retry.clone(),
        ));
        let marks = Arc::new(MarkMutator::new(Arc::clone(&platform), settings.mark_retry));
        Self {
            registry,
            dedup: EventDeduplicator::new(),
            gate: PermissionGate::new(platform, settings.membership_retry),
            exclusivity: ExclusivityEnforcer::new(Arc::clone(&membership), marks),
            membership,
            self_user: settings.self_user,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MenuRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn deduplicator(&self) -> &EventDeduplicator {
        &self.dedup
    }

    /// Process one event to completion.
    pub async fn handle(&self, event: SelectionEvent) -> EventOutcome {
        let outcome = self.process(&event).await;
        match &outcome {
            EventOutcome::Failed(error) => tracing::warn!(
                actor = %event.actor,
                posting = %event.posting,
                token = %event.token,
                %error,
                "Selection failed"
            ),
            EventOutcome::Processed(report) => tracing::debug!(
                actor = %event.actor,
                posting = %event.posting,
                token = %event.token,
                change = ?report.change,
                cleaned = report.cleanup.len(),
                "Selection processed"
            ),
            benign => tracing::debug!(
                actor = %event.actor,
                posting = %event.posting,
                token = %event.token,
                outcome = ?benign,
                "Selection not applied"
            ),
        }
        outcome
    }

    async fn process(&self, event: &SelectionEvent) -> EventOutcome {
        if event.actor_is_bot || self.self_user == Some(event.actor) {
            return EventOutcome::Ignored(IgnoreReason::BotActor);
        }

        let Some(_guard) = self.dedup.try_acquire(event.actor, event.posting) else {
            return EventOutcome::Dropped;
        };

        let menu = match self.registry.lookup(event.posting).await {
            Ok(Some(menu)) => menu,
            Ok(None) => return EventOutcome::Ignored(IgnoreReason::UnknownMenu),
            Err(error) => return EventOutcome::Failed(error.into()),
        };

        let Some(option) = resolve(&menu, &event.token) else {
            return EventOutcome::Ignored(IgnoreReason::UnknownOption);
        };

        let guild = event.posting.guild;
        match self.gate.can_manage(guild, option.role).await {
            Ok(()) => {}
            Err(SyncError::PermissionDenied(reason)) => return EventOutcome::Discarded(reason),
            Err(error) => return EventOutcome::Failed(error),
        }

        let (change, cleanup) = match (event.kind, menu.mode()) {
            (SelectionKind::Add, MenuMode::Exclusive) => {
                self.select_exclusive(&menu, event, option).await
            }
            (SelectionKind::Add, MenuMode::Multi) => (
                self.membership.grant(guild, event.actor, option.role).await,
                Vec::new(),
            ),
            (SelectionKind::Remove, _) => (
                self.membership.revoke(guild, event.actor, option.role).await,
                Vec::new(),
            ),
        };

        match change {
            Ok(change) => EventOutcome::Processed(ProcessReport {
                option: option.clone(),
                change,
                cleanup,
            }),
            Err(error) => EventOutcome::Failed(error),
        }
    }

    /// Grant the picked role while clearing the others. The two touch
    /// disjoint roles, so neither waits on the other.
    async fn select_exclusive(
        &self,
        menu: &MenuDefinition,
        event: &SelectionEvent,
        option: &MenuOption,
    ) -> (Result<MembershipChange, SyncError>, Vec<OptionCleanup>) {
        tokio::join!(
            self.membership
                .grant(event.posting.guild, event.actor, option.role),
            self.exclusivity
                .enforce(menu, event.posting, event.actor, &event.token),
        )
    }

    /// Consume events until the channel closes, one task per event, then
    /// wait for every in-flight task.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SelectionEvent>) -> RunSummary {
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let sync = Arc::clone(&self);
                    tasks.spawn(async move { sync.handle(event).await });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    record_join(&mut summary, joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record_join(&mut summary, joined);
        }
        tracing::info!(?summary, "Event stream closed");
        summary
    }
}

fn record_join(summary: &mut RunSummary, joined: Result<EventOutcome, JoinError>) {
    match joined {
        Ok(outcome) => summary.record(&outcome),
        Err(error) => {
            summary.aborted += 1;
            tracing::error!(%error, "Selection task aborted");
        }
    }
}
