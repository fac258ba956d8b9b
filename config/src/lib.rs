//! Configuration for the rolesync daemon.
//!
//! Loaded from `~/.rolesync/config.toml` (or the file named by
//! `ROLESYNC_CONFIG`). Every section is optional; a missing file yields the
//! defaults.
//!
//! ```toml
//! [discord]
//! token = "${DISCORD_TOKEN}"
//! request_timeout_secs = 15
//!
//! [engine]
//! warm_cache = true
//!
//! [retry.marks]
//! max_attempts = 5
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use rolesync_platform::RetryPolicy;
use rolesync_platform::discord::{DISCORD_API_BASE, DiscordClientConfig};

pub const CONFIG_ENV: &str = "ROLESYNC_CONFIG";
pub const TOKEN_ENV: &str = "ROLESYNC_DISCORD_TOKEN";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_EVENT_BUFFER: usize = 256;

const fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolesyncConfig {
    #[serde(default)]
    pub discord: DiscordSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub retry: RetrySections,
}

#[derive(Default, Deserialize)]
pub struct DiscordSection {
    /// Bot token. `${VAR}` references are expanded from the environment.
    pub token: Option<String>,
    pub api_base: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking the bot token in logs.
impl fmt::Debug for DiscordSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("DiscordSection")
            .field("token", &token)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    /// SQLite database path. A leading `~/` is expanded to the home directory.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    /// Preload every published menu at startup.
    #[serde(default = "default_true")]
    pub warm_cache: bool,
    /// Capacity of the inbound event channel.
    pub event_buffer: Option<usize>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            warm_cache: true,
            event_buffer: None,
        }
    }
}

impl EngineSection {
    #[must_use]
    pub fn event_buffer(&self) -> usize {
        self.event_buffer
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrySections {
    #[serde(default)]
    pub membership: RetrySection,
    #[serde(default)]
    pub marks: RetrySection,
}

impl RetrySections {
    #[must_use]
    pub fn membership_policy(&self) -> RetryPolicy {
        self.membership.overlay(RetryPolicy::membership())
    }

    #[must_use]
    pub fn marks_policy(&self) -> RetryPolicy {
        self.marks.overlay(RetryPolicy::marks())
    }
}

/// Overrides for one retry policy; unset fields keep the preset's values.
#[derive(Debug, Default, Deserialize)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl RetrySection {
    fn overlay(&self, mut policy: RetryPolicy) -> RetryPolicy {
        if let Some(attempts) = self.max_attempts {
            policy.max_attempts = attempts.max(1);
        }
        if let Some(ms) = self.initial_delay_ms {
            policy.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            policy.max_delay = Duration::from_millis(ms);
        }
        if policy.max_delay < policy.initial_delay {
            policy.max_delay = policy.initial_delay;
        }
        policy
    }
}

impl RolesyncConfig {
    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// The bot token: `ROLESYNC_DISCORD_TOKEN` wins over the config file.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        resolve_token(env::var(TOKEN_ENV).ok(), self.discord.token.as_deref())
    }

    /// Client settings, or `None` when no token is configured anywhere.
    #[must_use]
    pub fn discord_client(&self) -> Option<DiscordClientConfig> {
        let mut client = DiscordClientConfig::new(self.token()?);
        client.api_base = self
            .discord
            .api_base
            .clone()
            .unwrap_or_else(|| DISCORD_API_BASE.to_string());
        client.request_timeout = Duration::from_secs(
            self.discord
                .request_timeout_secs
                .filter(|&secs| secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );
        Some(client)
    }

    /// Resolved database path; `None` only when no home directory exists.
    #[must_use]
    pub fn store_path(&self) -> Option<PathBuf> {
        match self.store.path.as_deref() {
            Some(raw) => Some(expand_home(raw)),
            None => data_dir().map(|dir| dir.join("menus.db")),
        }
    }
}

fn resolve_token(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
    from_env
        .filter(|token| !token.trim().is_empty())
        .or_else(|| from_file.map(expand_env_vars))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Expand `${VAR}` references; unset variables become empty.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

/// `~/.rolesync`, home of the config, database and log file.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rolesync"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    data_dir().map(|dir| dir.join("config.toml"))
}
