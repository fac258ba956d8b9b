//! Shared test utilities and fixtures
//!
//! [`FakePlatform`] keeps memberships and marks in memory, records every
//! call, and can be scripted to fail specific operations.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rolesync_engine::{MenuRegistry, SyncSettings, Synchronizer};
use rolesync_platform::{
    EngineStanding, Platform, PlatformError, PlatformFut, RetryPolicy, TerminalKind,
};
use rolesync_store::{MenuStore, SharedMenuStore};
use rolesync_types::{
    ChannelId, ChannelRef, GuildId, MenuDraft, MenuMode, MenuOption, MessageId, PostingRef,
    RoleId, SelectionEvent, Token, UserId,
};

pub const GUILD: GuildId = GuildId::new(500);
pub const CHANNEL: ChannelId = ChannelId::new(600);
pub const ENGINE_USER: UserId = UserId::new(1);
pub const ACTOR: UserId = UserId::new(42);
pub const OTHER_ACTOR: UserId = UserId::new(43);

pub const FIRE: RoleId = RoleId::new(101);
pub const WATER: RoleId = RoleId::new(102);
pub const EARTH: RoleId = RoleId::new(103);
/// Ranked above the engine's highest role.
pub const ADMIN: RoleId = RoleId::new(199);

pub const ENGINE_RANK: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CurrentUser,
    MemberRoles,
    Standing,
    RoleRank,
    AddRole,
    RemoveRole,
    HasMark,
    RemoveMark,
}

#[derive(Default)]
struct State {
    standing: Option<EngineStanding>,
    ranks: HashMap<RoleId, i64>,
    members: HashMap<UserId, BTreeSet<RoleId>>,
    marks: HashMap<(PostingRef, Token), BTreeSet<UserId>>,
    calls: Vec<Op>,
    failures: HashMap<Op, VecDeque<PlatformError>>,
}

pub struct FakePlatform {
    state: Mutex<State>,
    latency: Duration,
}

impl FakePlatform {
    pub fn new() -> Self {
        let mut state = State {
            standing: Some(EngineStanding {
                highest_rank: ENGINE_RANK,
                manage_roles: true,
            }),
            ..State::default()
        };
        state.ranks.insert(FIRE, 2);
        state.ranks.insert(WATER, 3);
        state.ranks.insert(EARTH, 4);
        state.ranks.insert(ADMIN, 20);
        Self {
            state: Mutex::new(state),
            latency: Duration::ZERO,
        }
    }

    /// Every call sleeps this long first (use with paused time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_standing(&self, standing: EngineStanding) {
        self.state.lock().unwrap().standing = Some(standing);
    }

    pub fn delete_role(&self, role: RoleId) {
        self.state.lock().unwrap().ranks.remove(&role);
    }

    pub fn give_role(&self, user: UserId, role: RoleId) {
        self.state
            .lock()
            .unwrap()
            .members
            .entry(user)
            .or_default()
            .insert(role);
    }

    pub fn roles_of(&self, user: UserId) -> BTreeSet<RoleId> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_mark(&self, posting: PostingRef, token: &Token, user: UserId) {
        self.state
            .lock()
            .unwrap()
            .marks
            .entry((posting, token.clone()))
            .or_default()
            .insert(user);
    }

    pub fn clear_mark(&self, posting: PostingRef, token: &Token, user: UserId) {
        if let Some(users) = self
            .state
            .lock()
            .unwrap()
            .marks
            .get_mut(&(posting, token.clone()))
        {
            users.remove(&user);
        }
    }

    pub fn shows_mark(&self, posting: PostingRef, token: &Token, user: UserId) -> bool {
        self.state
            .lock()
            .unwrap()
            .marks
            .get(&(posting, token.clone()))
            .is_some_and(|users| users.contains(&user))
    }

    /// Queue `error` for the next `times` calls of `op`.
    pub fn fail(&self, op: Op, error: PlatformError, times: usize) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|&&call| call == op)
            .count()
    }

    pub fn mutation_count(&self) -> usize {
        self.count(Op::AddRole) + self.count(Op::RemoveRole) + self.count(Op::RemoveMark)
    }

    async fn enter(&self, op: Op) -> Result<(), PlatformError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Platform for FakePlatform {
    fn current_user(&self) -> PlatformFut<'_, UserId> {
        Box::pin(async move {
            self.enter(Op::CurrentUser).await?;
            Ok(ENGINE_USER)
        })
    }

    fn member_roles(&self, _guild: GuildId, user: UserId) -> PlatformFut<'_, Vec<RoleId>> {
        Box::pin(async move {
            self.enter(Op::MemberRoles).await?;
            Ok(self.roles_of(user).into_iter().collect())
        })
    }

    fn engine_standing(&self, _guild: GuildId) -> PlatformFut<'_, EngineStanding> {
        Box::pin(async move {
            self.enter(Op::Standing).await?;
            let state = self.state.lock().unwrap();
            state
                .standing
                .ok_or_else(|| PlatformError::terminal(TerminalKind::UnknownGuild, "no guild"))
        })
    }

    fn role_rank(&self, _guild: GuildId, role: RoleId) -> PlatformFut<'_, Option<i64>> {
        Box::pin(async move {
            self.enter(Op::RoleRank).await?;
            Ok(self.state.lock().unwrap().ranks.get(&role).copied())
        })
    }

    fn add_member_role(&self, _guild: GuildId, user: UserId, role: RoleId) -> PlatformFut<'_, ()> {
        Box::pin(async move {
            self.enter(Op::AddRole).await?;
            let mut state = self.state.lock().unwrap();
            if !state.ranks.contains_key(&role) {
                return Err(PlatformError::terminal(
                    TerminalKind::UnknownRole,
                    "Unknown Role",
                ));
            }
            state.members.entry(user).or_default().insert(role);
            Ok(())
        })
    }

    fn remove_member_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformFut<'_, ()> {
        Box::pin(async move {
            self.enter(Op::RemoveRole).await?;
            if let Some(roles) = self.state.lock().unwrap().members.get_mut(&user) {
                roles.remove(&role);
            }
            Ok(())
        })
    }

    fn has_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, bool> {
        Box::pin(async move {
            self.enter(Op::HasMark).await?;
            Ok(self.shows_mark(posting, token, user))
        })
    }

    fn remove_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, ()> {
        Box::pin(async move {
            self.enter(Op::RemoveMark).await?;
            self.clear_mark(posting, token, user);
            Ok(())
        })
    }
}

pub fn token(raw: &str) -> Token {
    Token::parse(raw).unwrap()
}

/// Retry policy with tiny delays so exhaustion tests stay fast.
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        jitter_factor: 0.0,
        max_retry_after: Duration::from_millis(10),
    }
}

/// A published menu backed by an in-memory SQLite store, wired to a fake
/// platform through a real [`Synchronizer`].
pub struct Fixture {
    pub platform: Arc<FakePlatform>,
    pub sync: Arc<Synchronizer>,
    pub posting: PostingRef,
}

impl Fixture {
    /// Exclusive menu: 🔥 → FIRE, 💧 → WATER.
    pub async fn elements() -> Self {
        Self::build(
            MenuMode::Exclusive,
            vec![("🔥", FIRE, "Fire"), ("💧", WATER, "Water")],
            FakePlatform::new(),
        )
        .await
    }

    pub async fn build(
        mode: MenuMode,
        options: Vec<(&str, RoleId, &str)>,
        platform: FakePlatform,
    ) -> Self {
        let options = options
            .into_iter()
            .map(|(raw, role, label)| MenuOption::new(token(raw), role, label))
            .collect();
        let draft =
            MenuDraft::new(ChannelRef::new(GUILD, CHANNEL), "Elements", mode, options).unwrap();

        let mut store = MenuStore::open_in_memory().unwrap();
        let id = store.create(&draft).unwrap();
        let registry = Arc::new(MenuRegistry::new(Arc::new(SharedMenuStore::new(store))));
        let menu = registry.publish(id, MessageId::new(700)).await.unwrap();
        let posting = menu.posting().unwrap();

        let platform = Arc::new(platform);
        let settings = SyncSettings {
            membership_retry: quick_retry(),
            mark_retry: quick_retry(),
            self_user: Some(ENGINE_USER),
        };
        let sync = Arc::new(Synchronizer::new(platform.clone(), registry, settings));

        Self {
            platform,
            sync,
            posting,
        }
    }

    /// The actor puts `raw` on the posting; returns the resulting event.
    pub fn react(&self, actor: UserId, raw: &str) -> SelectionEvent {
        let token = token(raw);
        self.platform.set_mark(self.posting, &token, actor);
        SelectionEvent::add(actor, self.posting, token)
    }

    /// The actor takes `raw` off the posting; returns the resulting event.
    pub fn unreact(&self, actor: UserId, raw: &str) -> SelectionEvent {
        let token = token(raw);
        self.platform.clear_mark(self.posting, &token, actor);
        SelectionEvent::remove(actor, self.posting, token)
    }

    pub fn shows(&self, actor: UserId, raw: &str) -> bool {
        self.platform.shows_mark(self.posting, &token(raw), actor)
    }

    /// Roles the actor holds among the menu's options.
    pub fn menu_roles(&self, actor: UserId) -> Vec<RoleId> {
        self.platform
            .roles_of(actor)
            .into_iter()
            .filter(|role| [FIRE, WATER, EARTH].contains(role))
            .collect()
    }
}
