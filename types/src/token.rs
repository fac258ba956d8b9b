//! Toggle-mark identity.
//!
//! A token is either a unicode emoji (`🔥`) or a custom emoji, written
//! `<:name:id>` or `<a:name:id>` when animated. Custom emoji compare by id so
//! a rename on the platform does not orphan menu options.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenParseError {
    #[error("token must not be empty")]
    Empty,
    #[error("token must not contain whitespace: {0:?}")]
    Whitespace(String),
    #[error("malformed custom emoji: {0:?}")]
    MalformedCustom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Token {
    Unicode(String),
    Custom {
        name: String,
        id: u64,
        animated: bool,
    },
}

impl Token {
    pub fn parse(raw: &str) -> Result<Self, TokenParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TokenParseError::Empty);
        }

        if let Some(inner) = raw.strip_prefix('<') {
            let inner = inner
                .strip_suffix('>')
                .ok_or_else(|| TokenParseError::MalformedCustom(raw.to_string()))?;
            let (animated, rest) = match inner.strip_prefix("a:") {
                Some(rest) => (true, rest),
                None => (
                    false,
                    inner
                        .strip_prefix(':')
                        .ok_or_else(|| TokenParseError::MalformedCustom(raw.to_string()))?,
                ),
            };
            return Self::custom_from_pair(rest, animated)
                .ok_or_else(|| TokenParseError::MalformedCustom(raw.to_string()));
        }

        if raw.chars().any(char::is_whitespace) {
            return Err(TokenParseError::Whitespace(raw.to_string()));
        }

        // Route form `name:id`, as used in reaction endpoints.
        if let Some(token) = Self::custom_from_pair(raw, false) {
            return Ok(token);
        }

        Ok(Self::Unicode(raw.to_string()))
    }

    fn custom_from_pair(pair: &str, animated: bool) -> Option<Self> {
        let (name, id) = pair.rsplit_once(':')?;
        if name.is_empty() || name.contains(':') {
            return None;
        }
        let id = id.parse::<u64>().ok()?;
        Some(Self::Custom {
            name: name.to_string(),
            id,
            animated,
        })
    }

    /// The emoji as it appears in reaction routes (`name:id` or the raw
    /// unicode sequence). Callers are responsible for percent-encoding.
    #[must_use]
    pub fn route_segment(&self) -> String {
        match self {
            Self::Unicode(emoji) => emoji.clone(),
            Self::Custom { name, id, .. } => format!("{name}:{id}"),
        }
    }

    #[must_use]
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unicode(a), Self::Unicode(b)) => a == b,
            (Self::Custom { id: a, .. }, Self::Custom { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Unicode(emoji) => {
                0u8.hash(state);
                emoji.hash(state);
            }
            Self::Custom { id, .. } => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(emoji) => f.write_str(emoji),
            Self::Custom {
                name,
                id,
                animated: true,
            } => write!(f, "<a:{name}:{id}>"),
            Self::Custom {
                name,
                id,
                animated: false,
            } => write!(f, "<:{name}:{id}>"),
        }
    }
}

impl TryFrom<String> for Token {
    type Error = TokenParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Token {
    type Error = TokenParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}
