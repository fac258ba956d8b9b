//! Discord REST implementation of [`Platform`].
//!
//! Each method issues exactly one request and maps the response onto the
//! [`PlatformError`] taxonomy. Classification uses the HTTP status first and
//! the JSON error `code` to tell apart the many flavors of 404.

use std::fmt;
use std::time::Duration;

use reqwest::{Method, Response, StatusCode, header::HeaderMap, redirect};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::OnceCell;
use url::Url;

use rolesync_types::{GuildId, PostingRef, RoleId, Token, UserId};

use crate::{EngineStanding, Platform, PlatformError, PlatformFut, TerminalKind};

/// Canonical Discord REST base URL.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Page size for reaction user listings (platform maximum).
const REACTION_PAGE_LIMIT: usize = 100;
/// Upper bound on pages scanned when checking a single user's mark.
const MAX_REACTION_PAGES: usize = 50;

const PERMISSION_ADMINISTRATOR: u64 = 1 << 3;
const PERMISSION_MANAGE_ROLES: u64 = 1 << 28;

// JSON error codes, see the platform's "JSON Error Codes" table.
const CODE_UNKNOWN_CHANNEL: u32 = 10003;
const CODE_UNKNOWN_GUILD: u32 = 10004;
const CODE_UNKNOWN_MEMBER: u32 = 10007;
const CODE_UNKNOWN_MESSAGE: u32 = 10008;
const CODE_UNKNOWN_ROLE: u32 = 10011;
const CODE_UNKNOWN_USER: u32 = 10013;
const CODE_UNKNOWN_EMOJI: u32 = 10014;
const CODE_MISSING_ACCESS: u32 = 50001;
const CODE_MISSING_PERMISSIONS: u32 = 50013;

#[derive(Clone)]
pub struct DiscordClientConfig {
    pub token: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl DiscordClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DISCORD_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

// Manual Debug impl to prevent leaking the bot token in logs.
impl fmt::Debug for DiscordClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordClientConfig")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscordClientError {
    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBase { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: UserId,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    #[serde(default)]
    roles: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    id: RoleId,
    position: i64,
    #[serde(default)]
    permissions: Option<String>,
}

impl RolePayload {
    fn permission_bits(&self) -> u64 {
        self.permissions
            .as_deref()
            .and_then(|bits| bits.parse::<u64>().ok())
            .unwrap_or(0)
    }
}

/// Parse a `Retry-After` header (seconds, possibly fractional).
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    seconds_to_duration(secs)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 && secs < 3600.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Determine if a response status is worth another attempt.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        408 | 429 | 500 | 502 | 503 | 504 | 520..=599
    )
}

fn terminal_kind_for(status: StatusCode, code: Option<u32>) -> TerminalKind {
    match code {
        Some(CODE_UNKNOWN_CHANNEL) => return TerminalKind::UnknownChannel,
        Some(CODE_UNKNOWN_GUILD) => return TerminalKind::UnknownGuild,
        Some(CODE_UNKNOWN_MEMBER) => return TerminalKind::UnknownMember,
        Some(CODE_UNKNOWN_MESSAGE) => return TerminalKind::UnknownMessage,
        Some(CODE_UNKNOWN_ROLE) => return TerminalKind::UnknownRole,
        Some(CODE_UNKNOWN_USER) => return TerminalKind::UnknownUser,
        Some(CODE_UNKNOWN_EMOJI) => return TerminalKind::UnknownEmoji,
        Some(CODE_MISSING_ACCESS | CODE_MISSING_PERMISSIONS) => {
            return TerminalKind::MissingPermissions;
        }
        _ => {}
    }
    match status {
        StatusCode::UNAUTHORIZED => TerminalKind::Unauthorized,
        StatusCode::FORBIDDEN => TerminalKind::MissingPermissions,
        other => TerminalKind::Rejected {
            status: other.as_u16(),
        },
    }
}

/// Map a non-success response onto the error taxonomy.
#[must_use]
pub fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> PlatformError {
    let parsed: Option<ApiErrorBody> = serde_json::from_slice(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| status.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parsed
            .as_ref()
            .and_then(|b| b.retry_after)
            .and_then(seconds_to_duration)
            .or_else(|| parse_retry_after(headers));
        return PlatformError::rate_limited(retry_after);
    }

    if is_retryable_status(status) {
        return PlatformError::Transient {
            reason: format!("{status}: {message}"),
            retry_after: parse_retry_after(headers),
        };
    }

    let code = parsed.as_ref().and_then(|b| b.code);
    PlatformError::terminal(terminal_kind_for(status, code), message)
}

fn classify_transport(error: &reqwest::Error) -> PlatformError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        PlatformError::transient(error.to_string())
    } else {
        PlatformError::terminal(TerminalKind::Transport, error.to_string())
    }
}

/// Discord REST client.
pub struct DiscordClient {
    http: reqwest::Client,
    base: Url,
    authorization: String,
    current_user: OnceCell<UserId>,
}

impl fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    pub fn new(config: &DiscordClientConfig) -> Result<Self, DiscordClientError> {
        let base = Url::parse(&config.api_base).map_err(|e| DiscordClientError::InvalidBase {
            url: config.api_base.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(DiscordClientError::InvalidBase {
                url: config.api_base.clone(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.request_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            base,
            authorization: format!("Bot {}", config.token),
            current_user: OnceCell::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn send(&self, method: Method, url: Url) -> Result<Response, PlatformError> {
        let response = self
            .http
            .request(method, url)
            .header("Authorization", &self.authorization)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.unwrap_or_else(|e| {
            tracing::debug!(%status, error = %e, "Failed to read error body; classifying by status");
            Default::default()
        });
        Err(classify_failure(status, &headers, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, PlatformError> {
        let response = self.send(Method::GET, url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::transient(format!("malformed response body: {e}")))
    }

    async fn fetch_current_user(&self) -> Result<UserId, PlatformError> {
        self.current_user
            .get_or_try_init(|| async {
                let user: UserPayload = self.get_json(self.endpoint(&["users", "@me"])).await?;
                Ok(user.id)
            })
            .await
            .copied()
    }

    async fn fetch_member_roles(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        let url = self.endpoint(&["guilds", &guild.to_string(), "members", &user.to_string()]);
        let member: MemberPayload = self.get_json(url).await?;
        Ok(member.roles)
    }

    async fn fetch_roles(&self, guild: GuildId) -> Result<Vec<RolePayload>, PlatformError> {
        self.get_json(self.endpoint(&["guilds", &guild.to_string(), "roles"]))
            .await
    }

    async fn fetch_standing(&self, guild: GuildId) -> Result<EngineStanding, PlatformError> {
        let me = self.fetch_current_user().await?;
        let held = self.fetch_member_roles(guild, me).await?;
        let roles = self.fetch_roles(guild).await?;

        // The @everyone role shares the guild's id and applies to every member.
        let mut permissions = 0u64;
        let mut highest_rank = 0i64;
        for role in &roles {
            let everyone = role.id.value() == guild.value();
            if everyone || held.contains(&role.id) {
                permissions |= role.permission_bits();
                if !everyone {
                    highest_rank = highest_rank.max(role.position);
                }
            }
        }

        Ok(EngineStanding {
            highest_rank,
            manage_roles: permissions & (PERMISSION_ADMINISTRATOR | PERMISSION_MANAGE_ROLES) != 0,
        })
    }

    async fn fetch_role_rank(
        &self,
        guild: GuildId,
        role: RoleId,
    ) -> Result<Option<i64>, PlatformError> {
        let roles = self.fetch_roles(guild).await?;
        Ok(roles.iter().find(|r| r.id == role).map(|r| r.position))
    }

    fn member_role_url(&self, guild: GuildId, user: UserId, role: RoleId) -> Url {
        self.endpoint(&[
            "guilds",
            &guild.to_string(),
            "members",
            &user.to_string(),
            "roles",
            &role.to_string(),
        ])
    }

    fn reaction_url(&self, posting: PostingRef, token: &Token, tail: &[&str]) -> Url {
        let channel = posting.channel.to_string();
        let message = posting.message.to_string();
        let emoji = token.route_segment();
        let mut segments = vec![
            "channels",
            channel.as_str(),
            "messages",
            message.as_str(),
            "reactions",
            emoji.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    async fn scan_mark(
        &self,
        posting: PostingRef,
        token: &Token,
        user: UserId,
    ) -> Result<bool, PlatformError> {
        let mut after: Option<UserId> = None;
        for _ in 0..MAX_REACTION_PAGES {
            let mut url = self.reaction_url(posting, token, &[]);
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &REACTION_PAGE_LIMIT.to_string());
                if let Some(after) = after {
                    query.append_pair("after", &after.to_string());
                }
            }
            let page: Vec<UserPayload> = self.get_json(url).await?;
            if page.iter().any(|u| u.id == user) {
                return Ok(true);
            }
            if page.len() < REACTION_PAGE_LIMIT {
                return Ok(false);
            }
            after = page.last().map(|u| u.id);
        }
        // Too many holders to scan; let the caller attempt the (idempotent) removal.
        tracing::debug!(posting = %posting, token = %token, "Reaction scan truncated");
        Ok(true)
    }
}

impl Platform for DiscordClient {
    fn current_user(&self) -> PlatformFut<'_, UserId> {
        Box::pin(self.fetch_current_user())
    }

    fn member_roles(&self, guild: GuildId, user: UserId) -> PlatformFut<'_, Vec<RoleId>> {
        Box::pin(self.fetch_member_roles(guild, user))
    }

    fn engine_standing(&self, guild: GuildId) -> PlatformFut<'_, EngineStanding> {
        Box::pin(self.fetch_standing(guild))
    }

    fn role_rank(&self, guild: GuildId, role: RoleId) -> PlatformFut<'_, Option<i64>> {
        Box::pin(self.fetch_role_rank(guild, role))
    }

    fn add_member_role(&self, guild: GuildId, user: UserId, role: RoleId) -> PlatformFut<'_, ()> {
        Box::pin(async move {
            self.send(Method::PUT, self.member_role_url(guild, user, role))
                .await
                .map(drop)
        })
    }

    fn remove_member_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformFut<'_, ()> {
        Box::pin(async move {
            self.send(Method::DELETE, self.member_role_url(guild, user, role))
                .await
                .map(drop)
        })
    }

    fn has_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, bool> {
        Box::pin(self.scan_mark(posting, token, user))
    }

    fn remove_mark<'a>(
        &'a self,
        posting: PostingRef,
        token: &'a Token,
        user: UserId,
    ) -> PlatformFut<'a, ()> {
        Box::pin(async move {
            let user = user.to_string();
            let url = self.reaction_url(posting, token, &[user.as_str()]);
            self.send(Method::DELETE, url).await.map(drop)
        })
    }
}
